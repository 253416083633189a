use image::DynamicImage;
use ratatui::widgets::ListState;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::catalog::{self, VideoItem};
use crate::config::Config;
use crate::constants::constants;
use crate::display::DisplayMode;
use crate::hls::HlsClient;
use crate::playback::PlaybackSession;
use crate::player::{ElementCaps, Player};
use crate::remote;
use crate::route::{self, View};
use crate::theme::THEMES;

// --- App State ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  /// Typing in the search box; every keystroke recomputes the visible list.
  Search,
  /// Navigating the card list.
  Browse,
}

pub struct App {
  // The catalog is fixed after load; only the view over it changes.
  pub catalog: Vec<VideoItem>,
  /// Distinct tag vocabulary, sorted. Derived once from the catalog.
  pub tags: Vec<String>,

  // Filter state. Lives until the process exits, never reset.
  pub query: String,
  pub cursor: usize,
  pub input_scroll: usize,
  /// Index into `tags` of the active tag chip, if any.
  pub active_tag: Option<usize>,
  /// Indices into `catalog` that pass the current query + tag, in catalog
  /// order. Recomputed after every relevant mutation.
  pub filtered_indices: Vec<usize>,

  // UI state
  pub mode: AppMode,
  pub view: View,
  pub list_state: ListState,
  pub theme_index: usize,
  pub display_mode: DisplayMode,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  pub should_quit: bool,
  /// When the last error was set — used for auto-dismiss.
  error_time: Option<Instant>,

  // Playback. Exactly one of `session` / `element` holds the player: the
  // open session owns it, and close() hands it back.
  pub session: Option<PlaybackSession<Player>>,
  element: Option<Player>,
  client: Option<HlsClient>,
  caps: ElementCaps,
  pub http_client: reqwest::Client,

  // Thumbnails, prefetched in the background and cached by video id.
  pub thumbs: HashMap<String, DynamicImage>,
  /// Resize cache for the detail pane: (id, width, height, image).
  pub resized_thumb: Option<(String, u16, u16, DynamicImage)>,
  thumb_rx: Option<mpsc::Receiver<(String, DynamicImage)>>,
  thumb_handle: Option<JoinHandle<()>>,
}

impl App {
  pub fn new(catalog: Vec<VideoItem>, display_mode: DisplayMode, caps: ElementCaps) -> Self {
    let config = Config::load();
    let theme_index =
      if let Some(ref name) = config.theme_name { THEMES.iter().position(|t| t.name == name).unwrap_or(0) } else { 0 };

    let tags = catalog::distinct_tags(&catalog);
    let filtered_indices: Vec<usize> = (0..catalog.len()).collect();
    let mut list_state = ListState::default();
    if !filtered_indices.is_empty() {
      list_state.select(Some(0));
    }

    let http_client = reqwest::Client::new();
    let client = caps.available.then(|| HlsClient::new(http_client.clone()));

    Self {
      catalog,
      tags,
      query: String::new(),
      cursor: 0,
      input_scroll: 0,
      active_tag: None,
      filtered_indices,
      mode: AppMode::Search,
      view: View::Library,
      list_state,
      theme_index,
      display_mode,
      last_error: None,
      status_message: None,
      should_quit: false,
      error_time: None,
      session: None,
      element: Some(Player::new(caps)),
      client,
      caps,
      http_client,
      thumbs: HashMap::new(),
      resized_thumb: None,
      thumb_rx: None,
      thumb_handle: None,
    }
  }

  pub fn theme(&self) -> &'static crate::theme::Theme {
    // Safety: theme_index is always bounded by modular arithmetic in next_theme()
    // and clamped on initialization.
    &THEMES[self.theme_index]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.save_config();
  }

  fn save_config(&self) {
    let config = Config { theme_name: Some(self.theme().name.to_string()) };
    config.save();
  }

  // --- Status / errors ---

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  /// Clear the current error message and its expiry timer.
  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages once the dismiss window has passed.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(constants().error_dismiss_secs)
    {
      self.last_error = None;
      self.error_time = None;
    }
  }

  // --- Filter state ---

  pub fn active_tag_name(&self) -> Option<&str> {
    self.active_tag.and_then(|i| self.tags.get(i)).map(String::as_str)
  }

  /// Rebuild `filtered_indices` from the catalog and the current filter
  /// state. Clamps the list selection to stay within the filtered range.
  pub fn recompute_filter(&mut self) {
    self.filtered_indices = catalog::filter_indices(&self.catalog, &self.query, self.active_tag_name());
    if self.filtered_indices.is_empty() {
      self.list_state.select(None);
    } else {
      let sel = self.list_state.selected().unwrap_or(0);
      if sel >= self.filtered_indices.len() {
        self.list_state.select(Some(self.filtered_indices.len().saturating_sub(1)));
      } else if self.list_state.selected().is_none() {
        self.list_state.select(Some(0));
      }
    }
  }

  /// Cycle the active tag chip: none → first → … → last → none.
  pub fn cycle_tag(&mut self) {
    if self.tags.is_empty() {
      return;
    }
    self.active_tag = match self.active_tag {
      None => Some(0),
      Some(i) if i + 1 < self.tags.len() => Some(i + 1),
      Some(_) => None,
    };
    debug!(tag = ?self.active_tag_name(), "tag filter changed");
    self.recompute_filter();
  }

  /// The catalog index of the selected card, mapped through the filter.
  pub fn selected_catalog_index(&self) -> Option<usize> {
    let selected = self.list_state.selected()?;
    self.filtered_indices.get(selected).copied()
  }

  // --- Navigation / playback sessions ---

  /// Open the app at a path (`--open`). Unknown ids and shapes land on the
  /// inline not-found view.
  pub fn open_path(&mut self, path: &str) {
    match route::resolve(path, &self.catalog) {
      View::Library => self.view = View::Library,
      View::Detail(index) => self.open_video(index),
      not_found @ View::NotFound(_) => self.view = not_found,
    }
  }

  /// Open the selected card's detail view and start its playback session.
  pub fn open_selected(&mut self) {
    if let Some(index) = self.selected_catalog_index() {
      self.open_video(index);
    }
  }

  /// Open a playback session for the catalog entry at `index`. Any existing
  /// session (same video or not) is closed first, so there is never more
  /// than one live attachment.
  pub fn open_video(&mut self, index: usize) {
    let Some(item) = self.catalog.get(index).cloned() else { return };
    if let Some(ref session) = self.session {
      debug!(from = session.item_index(), to = index, "replacing open session");
    }
    self.clear_error();
    self.resized_thumb = None;
    let element = self.take_element();
    self.session = Some(PlaybackSession::open(item, index, element, self.client.clone()));
    self.view = View::Detail(index);
  }

  /// Close the detail view, releasing the session and its attachment.
  pub fn close_detail(&mut self) {
    if let Some(session) = self.session.take() {
      self.element = Some(session.close());
    }
    self.resized_thumb = None;
    self.view = View::Library;
  }

  /// Switch the open session to another source (0-based).
  pub fn select_source(&mut self, index: usize) {
    if let Some(ref mut session) = self.session {
      session.select_source(index);
    }
  }

  pub async fn toggle_pause(&mut self) {
    let result = match self.session {
      Some(ref mut session) => session.element_mut().toggle_pause().await,
      None => return,
    };
    if let Err(e) = result {
      self.set_error(format!("Pause error: {}", e));
    }
  }

  fn take_element(&mut self) -> Player {
    if let Some(session) = self.session.take() {
      session.close()
    } else {
      self.element.take().unwrap_or_else(|| Player::new(self.caps))
    }
  }

  // --- Background work ---

  /// Kick off the background thumbnail prefetch for every catalog entry
  /// that has a thumbnail URI.
  pub fn start_thumbnail_prefetch(&mut self) {
    let entries: Vec<(String, String)> = self
      .catalog
      .iter()
      .filter_map(|item| item.thumbnail_uri.as_ref().map(|uri| (item.id.clone(), uri.clone())))
      .collect();
    if entries.is_empty() {
      return;
    }
    info!(count = entries.len(), "starting thumbnail prefetch");
    self.status_message = Some(format!("Fetching {} thumbnails…", entries.len()));

    let (tx, rx) = mpsc::channel(16);
    let client = self.http_client.clone();
    let handle = tokio::spawn(async move {
      remote::prefetch_thumbnails(client, entries, tx).await;
    });
    self.thumb_rx = Some(rx);
    self.thumb_handle = Some(handle);
  }

  /// Poll all in-flight background work: the session's manifest signal and
  /// the thumbnail prefetch stream. Called once per tick.
  pub fn check_pending(&mut self) {
    if let Some(ref mut session) = self.session {
      session.poll();
    }

    if let Some(mut rx) = self.thumb_rx.take() {
      loop {
        match rx.try_recv() {
          Ok((id, image)) => {
            self.thumbs.insert(id, image);
          }
          Err(mpsc::error::TryRecvError::Empty) => {
            self.thumb_rx = Some(rx);
            break;
          }
          Err(mpsc::error::TryRecvError::Disconnected) => {
            self.status_message = None;
            break;
          }
        }
      }
    }
  }

  /// Drain buffered player status lines.
  pub fn check_player_status(&mut self) {
    if let Some(ref mut session) = self.session {
      session.element_mut().check_status();
    }
  }

  pub fn player_status_line(&self) -> Option<String> {
    self.session.as_ref().and_then(|s| s.element().last_status())
  }

  /// Release everything on the way out: the open session and the prefetch
  /// task.
  pub fn shutdown(&mut self) {
    self.close_detail();
    if let Some(handle) = self.thumb_handle.take() {
      handle.abort();
    }
    self.thumb_rx = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::{SourceKind, VideoSource};

  fn item(id: &str, title: &str, tags: &[&str]) -> VideoItem {
    VideoItem {
      id: id.to_string(),
      title: title.to_string(),
      description: None,
      date: None,
      duration: None,
      tags: tags.iter().map(|t| t.to_string()).collect(),
      thumbnail_uri: None,
      sources: vec![VideoSource {
        label: "720p".to_string(),
        kind: SourceKind::Progressive,
        uri: format!("https://example.com/{}.mp4", id),
      }],
    }
  }

  fn no_caps() -> ElementCaps {
    ElementCaps { available: false, native_playlists: false }
  }

  fn make_app() -> App {
    let catalog = vec![
      item("v1", "Sample Video 1", &["funny", "short"]),
      item("v2", "Sample Video 2", &["music", "live"]),
      item("v3", "Another One", &["music"]),
    ];
    App::new(catalog, DisplayMode::Ascii, no_caps())
  }

  // --- recompute_filter ---

  #[test]
  fn filter_starts_with_full_catalog() {
    let app = make_app();
    assert_eq!(app.filtered_indices, vec![0, 1, 2]);
    assert_eq!(app.list_state.selected(), Some(0));
  }

  #[test]
  fn recompute_narrows_and_clamps_selection() {
    let mut app = make_app();
    app.list_state.select(Some(2));
    app.query = "sample".to_string();
    app.recompute_filter();
    assert_eq!(app.filtered_indices, vec![0, 1]);
    assert_eq!(app.list_state.selected(), Some(1));
  }

  #[test]
  fn recompute_with_no_matches_clears_selection() {
    let mut app = make_app();
    app.query = "zzz".to_string();
    app.recompute_filter();
    assert!(app.filtered_indices.is_empty());
    assert_eq!(app.list_state.selected(), None);
  }

  #[test]
  fn selection_restored_when_matches_return() {
    let mut app = make_app();
    app.query = "zzz".to_string();
    app.recompute_filter();
    app.query.clear();
    app.recompute_filter();
    assert_eq!(app.list_state.selected(), Some(0));
  }

  // --- cycle_tag ---

  #[test]
  fn cycle_tag_walks_the_vocabulary_and_wraps() {
    let mut app = make_app();
    // vocabulary: funny, live, music, short (sorted)
    assert_eq!(app.tags, vec!["funny", "live", "music", "short"]);

    assert_eq!(app.active_tag_name(), None);
    app.cycle_tag();
    assert_eq!(app.active_tag_name(), Some("funny"));
    assert_eq!(app.filtered_indices, vec![0]);

    app.cycle_tag();
    app.cycle_tag();
    assert_eq!(app.active_tag_name(), Some("music"));
    assert_eq!(app.filtered_indices, vec![1, 2]);

    app.cycle_tag();
    assert_eq!(app.active_tag_name(), Some("short"));
    app.cycle_tag();
    assert_eq!(app.active_tag_name(), None);
    assert_eq!(app.filtered_indices, vec![0, 1, 2]);
  }

  #[test]
  fn tag_and_query_combine() {
    let mut app = make_app();
    app.query = "sample".to_string();
    app.active_tag = Some(2); // "music"
    app.recompute_filter();
    assert_eq!(app.filtered_indices, vec![1]);
  }

  // --- selected_catalog_index ---

  #[test]
  fn selected_index_maps_through_filter() {
    let mut app = make_app();
    app.active_tag = Some(2); // "music" -> catalog indices 1, 2
    app.recompute_filter();
    app.list_state.select(Some(1));
    assert_eq!(app.selected_catalog_index(), Some(2));
  }

  // --- open_path ---

  #[test]
  fn open_path_with_unknown_id_shows_not_found() {
    let mut app = make_app();
    app.open_path("/video/nope");
    assert_eq!(app.view, View::NotFound("nope".to_string()));
    assert!(app.session.is_none());
  }

  #[test]
  fn open_path_root_stays_on_library() {
    let mut app = make_app();
    app.open_path("/");
    assert_eq!(app.view, View::Library);
  }
}
