//! A minimal HTTP Live Streaming client: fetches a playlist, parses it, and
//! picks the variant the playback element should be handed.
//!
//! Only the manifest layer lives here. Segment scheduling, buffering, and
//! decoding belong to the playback element once it has a concrete stream.

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::constants::constants;

// --- Playlist model ---

/// One rendition advertised by a master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
  pub bandwidth: u64,
  pub resolution: Option<(u32, u32)>,
  pub name: Option<String>,
  pub uri: String,
}

impl Variant {
  /// Short display form: the NAME attribute, else `1280x720`, else the bandwidth.
  pub fn describe(&self) -> String {
    if let Some(ref name) = self.name {
      return name.clone();
    }
    if let Some((w, h)) = self.resolution {
      return format!("{}x{}", w, h);
    }
    format!("{} bps", self.bandwidth)
  }
}

/// A parsed playlist. A master playlist advertises variants; a media
/// playlist is already a concrete stream and is passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Manifest {
  /// Variants sorted ascending by bandwidth.
  Master { variants: Vec<Variant> },
  Media { segment_count: usize },
}

// --- Parsing ---

/// Pull one `KEY=VALUE` attribute out of an `#EXT-X-STREAM-INF:` line.
/// Quoted values keep their inner text; the commas inside quotes don't split.
fn stream_inf_attr<'a>(attrs: &'a str, key: &str) -> Option<&'a str> {
  let mut rest = attrs;
  while !rest.is_empty() {
    let eq = rest.find('=')?;
    let k = rest[..eq].trim();
    let after = &rest[eq + 1..];
    let (value, remainder) = if let Some(stripped) = after.strip_prefix('"') {
      let close = stripped.find('"')?;
      (&stripped[..close], stripped.get(close + 1..).unwrap_or("").trim_start_matches(','))
    } else {
      match after.find(',') {
        Some(comma) => (&after[..comma], &after[comma + 1..]),
        None => (after, ""),
      }
    };
    if k == key {
      return Some(value);
    }
    rest = remainder;
  }
  None
}

/// Resolve a possibly-relative playlist URI against the URI it came from.
fn resolve_uri(base: &str, reference: &str) -> String {
  if reference.starts_with("http://") || reference.starts_with("https://") {
    return reference.to_string();
  }
  match base.rfind('/') {
    Some(slash) => format!("{}/{}", &base[..slash], reference),
    None => reference.to_string(),
  }
}

/// Parse playlist text fetched from `base_uri`.
///
/// Returns `Master` when `#EXT-X-STREAM-INF` entries are present, `Media`
/// when the playlist carries `#EXTINF` segments, and an error otherwise —
/// including content that isn't an M3U playlist at all.
pub fn parse_manifest(content: &str, base_uri: &str) -> Result<Manifest> {
  let mut lines = content.lines().map(str::trim);
  if lines.next() != Some("#EXTM3U") {
    return Err(anyhow!("not an M3U playlist (missing #EXTM3U header)"));
  }

  let mut variants = Vec::new();
  let mut segment_count = 0usize;
  let mut pending_inf: Option<&str> = None;

  for line in lines {
    if line.is_empty() {
      continue;
    }
    if let Some(attrs) = line.strip_prefix("#EXT-X-STREAM-INF:") {
      pending_inf = Some(attrs);
      continue;
    }
    if line.starts_with("#EXTINF:") {
      segment_count += 1;
      continue;
    }
    if line.starts_with('#') {
      continue;
    }
    // A bare line is a URI: a variant if it follows #EXT-X-STREAM-INF.
    if let Some(attrs) = pending_inf.take() {
      let bandwidth = stream_inf_attr(attrs, "BANDWIDTH").and_then(|v| v.parse().ok()).unwrap_or(0);
      let resolution = stream_inf_attr(attrs, "RESOLUTION").and_then(|v| {
        let (w, h) = v.split_once('x')?;
        Some((w.parse().ok()?, h.parse().ok()?))
      });
      let name = stream_inf_attr(attrs, "NAME").map(str::to_string);
      variants.push(Variant { bandwidth, resolution, name, uri: resolve_uri(base_uri, line) });
    }
  }

  if !variants.is_empty() {
    variants.sort_by_key(|v| v.bandwidth);
    return Ok(Manifest::Master { variants });
  }
  if segment_count > 0 {
    return Ok(Manifest::Media { segment_count });
  }
  Err(anyhow!("playlist has neither variants nor segments"))
}

/// Pick the richest variant that fits the bandwidth budget, falling back to
/// the leanest one when nothing fits. `variants` must be non-empty and
/// sorted ascending by bandwidth (as produced by [`parse_manifest`]).
pub fn select_variant(variants: &[Variant], budget: u64) -> &Variant {
  variants.iter().rev().find(|v| v.bandwidth <= budget).unwrap_or(&variants[0])
}

// --- Client ---

/// Fetch-and-parse front end. Cloneable; the underlying HTTP client is
/// shared.
#[derive(Debug, Clone)]
pub struct HlsClient {
  http_client: Client,
}

impl HlsClient {
  pub fn new(http_client: Client) -> Self {
    Self { http_client }
  }

  /// Fetch a playlist and parse it. One attempt, bounded by the configured
  /// timeout; the caller decides whether a failure is worth retrying.
  pub async fn fetch_manifest(&self, uri: &str) -> Result<Manifest> {
    info!(uri = %uri, "hls: fetching playlist");
    let response = self
      .http_client
      .get(uri)
      .timeout(Duration::from_secs(constants().hls_timeout_secs))
      .send()
      .await
      .with_context(|| format!("Failed to fetch playlist from {}", uri))?;

    if !response.status().is_success() {
      return Err(anyhow!("playlist request failed with status {}", response.status()));
    }

    let content = response.text().await.context("Failed to read playlist body")?;
    let manifest = parse_manifest(&content, uri)?;
    if let Manifest::Master { ref variants } = manifest {
      debug!(variants = variants.len(), "hls: master playlist parsed");
    }
    Ok(manifest)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const MASTER: &str = "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-STREAM-INF:BANDWIDTH=865000,RESOLUTION=640x360\n\
chunklist_360.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=4100000,RESOLUTION=1280x720,NAME=\"720p\"\n\
chunklist_720.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=2100000,RESOLUTION=854x480\n\
https://cdn.example.com/abs/chunklist_480.m3u8\n";

  const MEDIA: &str = "#EXTM3U\n\
#EXT-X-TARGETDURATION:4\n\
#EXTINF:4.0,\n\
seg0.ts\n\
#EXTINF:4.0,\n\
seg1.ts\n\
#EXT-X-ENDLIST\n";

  // --- parse_manifest ---

  #[test]
  fn parse_master() {
    let manifest = parse_manifest(MASTER, "https://example.com/live/master.m3u8").unwrap();
    let Manifest::Master { variants } = manifest else {
      panic!("expected a master playlist");
    };
    assert_eq!(variants.len(), 3);
    // sorted ascending by bandwidth
    assert_eq!(variants[0].bandwidth, 865_000);
    assert_eq!(variants[1].bandwidth, 2_100_000);
    assert_eq!(variants[2].bandwidth, 4_100_000);
    assert_eq!(variants[0].resolution, Some((640, 360)));
    assert_eq!(variants[2].name.as_deref(), Some("720p"));
  }

  #[test]
  fn parse_master_resolves_relative_uris() {
    let manifest = parse_manifest(MASTER, "https://example.com/live/master.m3u8").unwrap();
    let Manifest::Master { variants } = manifest else {
      panic!("expected a master playlist");
    };
    assert_eq!(variants[0].uri, "https://example.com/live/chunklist_360.m3u8");
    // absolute URIs pass through untouched
    assert_eq!(variants[1].uri, "https://cdn.example.com/abs/chunklist_480.m3u8");
  }

  #[test]
  fn parse_media_playlist() {
    let manifest = parse_manifest(MEDIA, "https://example.com/live/chunklist.m3u8").unwrap();
    assert_eq!(manifest, Manifest::Media { segment_count: 2 });
  }

  #[test]
  fn parse_rejects_non_playlist() {
    assert!(parse_manifest("<html>nope</html>", "https://example.com/x").is_err());
    assert!(parse_manifest("", "https://example.com/x").is_err());
  }

  #[test]
  fn parse_rejects_header_only() {
    assert!(parse_manifest("#EXTM3U\n#EXT-X-VERSION:3\n", "https://example.com/x").is_err());
  }

  // --- stream_inf_attr ---

  #[test]
  fn attr_handles_quoted_values_with_commas() {
    let attrs = "BANDWIDTH=1000,CODECS=\"avc1.4d401f,mp4a.40.2\",RESOLUTION=640x360";
    assert_eq!(stream_inf_attr(attrs, "CODECS"), Some("avc1.4d401f,mp4a.40.2"));
    assert_eq!(stream_inf_attr(attrs, "RESOLUTION"), Some("640x360"));
    assert_eq!(stream_inf_attr(attrs, "BANDWIDTH"), Some("1000"));
    assert_eq!(stream_inf_attr(attrs, "NAME"), None);
  }

  // --- select_variant ---

  fn variant(bandwidth: u64) -> Variant {
    Variant { bandwidth, resolution: None, name: None, uri: format!("v{}.m3u8", bandwidth) }
  }

  #[test]
  fn select_richest_within_budget() {
    let variants = vec![variant(800_000), variant(2_000_000), variant(4_000_000)];
    assert_eq!(select_variant(&variants, 2_500_000).bandwidth, 2_000_000);
    assert_eq!(select_variant(&variants, 10_000_000).bandwidth, 4_000_000);
  }

  #[test]
  fn select_falls_back_to_leanest() {
    let variants = vec![variant(800_000), variant(2_000_000)];
    assert_eq!(select_variant(&variants, 100_000).bandwidth, 800_000);
  }

  // --- resolve_uri ---

  #[test]
  fn resolve_relative_against_base() {
    assert_eq!(resolve_uri("https://example.com/a/b/master.m3u8", "chunk.m3u8"), "https://example.com/a/b/chunk.m3u8");
  }
}
