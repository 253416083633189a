//! The playback session: the state of the one currently-open video viewer.
//!
//! A session owns the playback element while it exists, decides how each
//! source kind attaches (direct assignment vs. the HLS client), and tears the
//! previous attachment down on every transition: source switch, close, or
//! replacement. The invariant is "exactly one active attachment at a time,
//! always torn down before replaced".

use anyhow::Result;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::catalog::{SourceKind, VideoItem, VideoSource};
use crate::constants::constants;
use crate::hls::{self, HlsClient, Manifest};

// --- Element boundary ---

/// What the session needs from a playback element. The production
/// implementation wraps an mpv process; tests drive the session with a
/// scripted stub.
pub trait MediaElement {
  /// Point the element at a URI. Playback starts (or is queued) immediately.
  fn assign(&mut self, uri: &str) -> Result<()>;
  /// Stop playback and release the assigned source. Idempotent.
  fn clear(&mut self);
  fn assigned_uri(&self) -> Option<&str>;
  /// Whether the element natively demuxes adaptive playlists.
  fn supports_playlists(&self) -> bool;
}

// --- Errors ---

#[derive(Debug, Error)]
pub enum PlaybackError {
  /// An adaptive source was requested but neither the streaming client nor
  /// native playlist support is available.
  #[error("no playable path for \"{label}\" on this system")]
  UnsupportedSource { label: String },
  /// Network or parse failure while attaching a stream. Single attempt, no
  /// automatic retry; re-selecting the source tries again.
  #[error("stream failed to load: {reason}")]
  StreamLoad { reason: String },
}

// --- Session ---

type ManifestResult = (u64, Result<Manifest>);

pub struct PlaybackSession<E: MediaElement> {
  item: VideoItem,
  item_index: usize,
  active_source: usize,
  ready: bool,
  error: Option<PlaybackError>,
  element: E,
  /// `None` means the adaptive client is unsupported on this platform.
  client: Option<HlsClient>,
  /// Bumped on every teardown. Manifest results stamped with an older
  /// generation belong to an attachment that no longer exists and are
  /// dropped, so a slow fetch can never resurrect a torn-down attach.
  generation: u64,
  manifest_rx: Option<oneshot::Receiver<ManifestResult>>,
}

impl<E: MediaElement> PlaybackSession<E> {
  /// Open a viewer for `item`, taking ownership of the element. The first
  /// source is the default; the attach begins immediately.
  pub fn open(item: VideoItem, item_index: usize, element: E, client: Option<HlsClient>) -> Self {
    info!(id = %item.id, "session: opening");
    let mut session = Self {
      item,
      item_index,
      active_source: 0,
      ready: false,
      error: None,
      element,
      client,
      generation: 0,
      manifest_rx: None,
    };
    session.attach();
    session
  }

  pub fn item_index(&self) -> usize {
    self.item_index
  }

  pub fn active_source_index(&self) -> usize {
    self.active_source
  }

  /// The active source. Always a member of `item.sources`.
  pub fn active_source(&self) -> &VideoSource {
    &self.item.sources[self.active_source]
  }

  /// True once the attached source is playable. For adaptive sources on the
  /// client path this flips only after the manifest-parsed signal arrives.
  pub fn ready(&self) -> bool {
    self.ready
  }

  /// True while an adaptive attach is waiting on its manifest.
  pub fn attaching(&self) -> bool {
    self.manifest_rx.is_some()
  }

  pub fn error(&self) -> Option<&PlaybackError> {
    self.error.as_ref()
  }

  pub fn element(&self) -> &E {
    &self.element
  }

  pub fn element_mut(&mut self) -> &mut E {
    &mut self.element
  }

  /// Switch to another source of the same item. Out-of-range indices are
  /// ignored, which keeps the active source a member of the item's sources.
  /// Re-selecting the current source re-attaches it (the manual retry path).
  pub fn select_source(&mut self, index: usize) {
    if index >= self.item.sources.len() {
      warn!(index, id = %self.item.id, "session: source index out of range");
      return;
    }
    self.active_source = index;
    self.attach();
  }

  /// Close the viewer: release the attachment and hand the element back.
  pub fn close(mut self) -> E {
    info!(id = %self.item.id, "session: closing");
    self.teardown_attachment();
    self.element
  }

  /// Poll for the asynchronous manifest-parsed signal. Call once per tick.
  pub fn poll(&mut self) {
    if let Some(mut rx) = self.manifest_rx.take() {
      match rx.try_recv() {
        Ok((generation, result)) => {
          self.apply_manifest(generation, result);
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.manifest_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.error = Some(PlaybackError::StreamLoad { reason: "manifest task failed".to_string() });
        }
      }
    }
  }

  // --- Attach algorithm ---

  /// Release the current attachment. Runs on every exit path (source
  /// switch, close, session replacement) before anything new attaches.
  fn teardown_attachment(&mut self) {
    self.generation += 1;
    self.manifest_rx = None;
    self.element.clear();
    self.ready = false;
  }

  fn attach(&mut self) {
    self.teardown_attachment();
    self.error = None;

    let source = self.item.sources[self.active_source].clone();
    debug!(id = %self.item.id, label = %source.label, kind = source.kind.label(), "session: attaching");

    match source.kind {
      SourceKind::Progressive => self.assign_direct(&source.uri),
      SourceKind::Adaptive => {
        if let Some(ref client) = self.client {
          // Client path: readiness waits for the manifest-parsed signal.
          let client = client.clone();
          let generation = self.generation;
          let (tx, rx) = oneshot::channel();
          tokio::spawn(async move {
            let result = client.fetch_manifest(&source.uri).await;
            let _ = tx.send((generation, result));
          });
          self.manifest_rx = Some(rx);
        } else if self.element.supports_playlists() {
          // Native fallback: the element demuxes the playlist itself.
          self.assign_direct(&source.uri);
        } else {
          info!(label = %source.label, "session: no playable path for adaptive source");
          self.error = Some(PlaybackError::UnsupportedSource { label: source.label });
        }
      }
    }
  }

  fn assign_direct(&mut self, uri: &str) {
    match self.element.assign(uri) {
      Ok(()) => self.ready = true,
      Err(e) => {
        warn!(err = %format!("{:#}", e), "session: element rejected source");
        self.error = Some(PlaybackError::StreamLoad { reason: format!("{:#}", e) });
      }
    }
  }

  /// Act on a manifest result. Results from a torn-down attachment carry an
  /// older generation and are ignored.
  fn apply_manifest(&mut self, generation: u64, result: Result<Manifest>) {
    if generation != self.generation {
      debug!(generation, current = self.generation, "session: dropping stale manifest result");
      return;
    }
    match result {
      Ok(Manifest::Master { variants }) => {
        let variant = hls::select_variant(&variants, constants().hls_bandwidth_budget);
        info!(variant = %variant.describe(), "session: manifest parsed");
        let uri = variant.uri.clone();
        self.assign_direct(&uri);
      }
      Ok(Manifest::Media { segment_count }) => {
        // Already a concrete stream; hand the original URI straight over.
        debug!(segment_count, "session: media playlist, passing through");
        let uri = self.item.sources[self.active_source].uri.clone();
        self.assign_direct(&uri);
      }
      Err(e) => {
        warn!(err = %format!("{:#}", e), "session: manifest fetch failed");
        self.error = Some(PlaybackError::StreamLoad { reason: format!("{:#}", e) });
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::hls::Variant;
  use anyhow::anyhow;

  // A strict element: it does NOT clear on assign, so a session that skips
  // teardown trips the double-attach flag.
  #[derive(Default)]
  struct StubElement {
    assigned: Option<String>,
    native_playlists: bool,
    fail_assign: bool,
    clears: usize,
    assigns: usize,
    double_attach: bool,
  }

  impl MediaElement for StubElement {
    fn assign(&mut self, uri: &str) -> Result<()> {
      if self.fail_assign {
        return Err(anyhow!("element rejected {}", uri));
      }
      if self.assigned.is_some() {
        self.double_attach = true;
      }
      self.assigned = Some(uri.to_string());
      self.assigns += 1;
      Ok(())
    }

    fn clear(&mut self) {
      self.assigned = None;
      self.clears += 1;
    }

    fn assigned_uri(&self) -> Option<&str> {
      self.assigned.as_deref()
    }

    fn supports_playlists(&self) -> bool {
      self.native_playlists
    }
  }

  fn source(label: &str, kind: SourceKind, uri: &str) -> VideoSource {
    VideoSource { label: label.to_string(), kind, uri: uri.to_string() }
  }

  fn item_with(sources: Vec<VideoSource>) -> VideoItem {
    VideoItem {
      id: "v1".to_string(),
      title: "Sample Video 1".to_string(),
      description: None,
      date: None,
      duration: None,
      tags: Vec::new(),
      thumbnail_uri: None,
      sources,
    }
  }

  fn progressive_item() -> VideoItem {
    item_with(vec![
      source("1080p", SourceKind::Progressive, "https://example.com/v1-1080.mp4"),
      source("720p", SourceKind::Progressive, "https://example.com/v1-720.mp4"),
      source("480p", SourceKind::Progressive, "https://example.com/v1-480.mp4"),
    ])
  }

  // Points at the local discard port so a spawned fetch fails fast without
  // leaving the machine.
  fn adaptive_item() -> VideoItem {
    item_with(vec![
      source("Adaptive", SourceKind::Adaptive, "http://127.0.0.1:9/master.m3u8"),
      source("720p", SourceKind::Progressive, "https://example.com/v1-720.mp4"),
    ])
  }

  fn master(bandwidths: &[u64]) -> Manifest {
    Manifest::Master {
      variants: bandwidths
        .iter()
        .map(|&bandwidth| Variant {
          bandwidth,
          resolution: None,
          name: None,
          uri: format!("http://127.0.0.1:9/chunk_{}.m3u8", bandwidth),
        })
        .collect(),
    }
  }

  fn test_client() -> Option<HlsClient> {
    Some(HlsClient::new(reqwest::Client::new()))
  }

  // --- open / progressive ---

  #[test]
  fn progressive_source_is_ready_immediately() {
    let session = PlaybackSession::open(progressive_item(), 0, StubElement::default(), None);
    assert!(session.ready());
    assert!(session.error().is_none());
    assert_eq!(session.element().assigned_uri(), Some("https://example.com/v1-1080.mp4"));
    assert_eq!(session.active_source_index(), 0);
  }

  #[test]
  fn failed_assignment_surfaces_stream_load() {
    let element = StubElement { fail_assign: true, ..Default::default() };
    let session = PlaybackSession::open(progressive_item(), 0, element, None);
    assert!(!session.ready());
    assert!(matches!(session.error(), Some(PlaybackError::StreamLoad { .. })));
  }

  // --- open / adaptive ---

  #[tokio::test]
  async fn adaptive_with_client_waits_for_manifest() {
    let session = PlaybackSession::open(adaptive_item(), 0, StubElement::default(), test_client());
    assert!(!session.ready());
    assert!(session.attaching());
    assert!(session.error().is_none());
    // no element assignment until the manifest-parsed signal
    assert_eq!(session.element().assigned_uri(), None);
  }

  #[tokio::test]
  async fn manifest_parsed_attaches_budgeted_variant_and_flips_ready() {
    let mut session = PlaybackSession::open(adaptive_item(), 0, StubElement::default(), test_client());
    let generation = session.generation;

    session.apply_manifest(generation, Ok(master(&[800_000, 2_000_000, 9_000_000])));

    assert!(session.ready());
    // budget is 5 Mbps, so the 2 Mbps rendition wins
    assert_eq!(session.element().assigned_uri(), Some("http://127.0.0.1:9/chunk_2000000.m3u8"));
  }

  #[tokio::test]
  async fn media_playlist_passes_original_uri_through() {
    let mut session = PlaybackSession::open(adaptive_item(), 0, StubElement::default(), test_client());
    let generation = session.generation;

    session.apply_manifest(generation, Ok(Manifest::Media { segment_count: 12 }));

    assert!(session.ready());
    assert_eq!(session.element().assigned_uri(), Some("http://127.0.0.1:9/master.m3u8"));
  }

  #[tokio::test]
  async fn manifest_failure_surfaces_stream_load() {
    let mut session = PlaybackSession::open(adaptive_item(), 0, StubElement::default(), test_client());
    let generation = session.generation;

    session.apply_manifest(generation, Err(anyhow!("connection refused")));

    assert!(!session.ready());
    assert!(matches!(session.error(), Some(PlaybackError::StreamLoad { .. })));
  }

  #[test]
  fn adaptive_falls_back_to_native_playlist_support() {
    let element = StubElement { native_playlists: true, ..Default::default() };
    let session = PlaybackSession::open(adaptive_item(), 0, element, None);
    assert!(session.ready());
    assert_eq!(session.element().assigned_uri(), Some("http://127.0.0.1:9/master.m3u8"));
  }

  #[test]
  fn adaptive_with_no_playable_path_is_unsupported() {
    let session = PlaybackSession::open(adaptive_item(), 0, StubElement::default(), None);
    assert!(!session.ready());
    assert!(matches!(session.error(), Some(PlaybackError::UnsupportedSource { .. })));
    // the element never saw a source assignment
    assert_eq!(session.element().assigned_uri(), None);
    assert_eq!(session.element().assigns, 0);
  }

  // --- select_source / teardown ---

  #[test]
  fn switching_sources_tears_down_before_attaching() {
    let mut session = PlaybackSession::open(progressive_item(), 0, StubElement::default(), None);
    session.select_source(1);
    session.select_source(2);
    session.select_source(0);

    let element = session.element();
    assert!(!element.double_attach, "an attach happened without a teardown first");
    assert_eq!(element.assigned_uri(), Some("https://example.com/v1-1080.mp4"));
    assert!(session.ready());
  }

  #[test]
  fn out_of_range_source_index_is_ignored() {
    let mut session = PlaybackSession::open(progressive_item(), 0, StubElement::default(), None);
    session.select_source(99);
    assert_eq!(session.active_source_index(), 0);
    assert_eq!(session.element().assigned_uri(), Some("https://example.com/v1-1080.mp4"));
  }

  #[test]
  fn reselecting_the_active_source_reattaches() {
    let mut session = PlaybackSession::open(progressive_item(), 0, StubElement::default(), None);
    let assigns_before = session.element().assigns;
    session.select_source(0);
    assert_eq!(session.element().assigns, assigns_before + 1);
  }

  #[tokio::test]
  async fn stale_manifest_result_is_ignored_after_source_switch() {
    let mut session = PlaybackSession::open(adaptive_item(), 0, StubElement::default(), test_client());
    let stale_generation = session.generation;

    // Switch to the progressive source while the manifest is still in
    // flight; the adaptive attachment is torn down.
    session.select_source(1);
    assert!(session.ready());
    assert_eq!(session.element().assigned_uri(), Some("https://example.com/v1-720.mp4"));

    // The late manifest signal for the torn-down attach must change nothing.
    session.apply_manifest(stale_generation, Ok(master(&[2_000_000])));
    assert_eq!(session.element().assigned_uri(), Some("https://example.com/v1-720.mp4"));
    assert!(session.ready());
    assert!(session.error().is_none());
  }

  #[tokio::test]
  async fn switching_away_drops_the_pending_manifest_receiver() {
    let mut session = PlaybackSession::open(adaptive_item(), 0, StubElement::default(), test_client());
    assert!(session.attaching());
    session.select_source(1);
    // the receiver was dropped with the teardown, so a late send can't land
    assert!(!session.attaching());
  }

  // --- close ---

  #[test]
  fn close_releases_the_attachment_and_returns_the_element() {
    let session = PlaybackSession::open(progressive_item(), 0, StubElement::default(), None);
    let element = session.close();
    assert_eq!(element.assigned_uri(), None);
    assert!(element.clears >= 2); // once on open's teardown, once on close
  }
}
