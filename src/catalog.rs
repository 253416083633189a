//! The video catalog: record types, the built-in embedded catalog, and the
//! pure filter/tag derivations the library view recomputes on every change.

use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;

// --- Records ---

/// How a source is played: a single downloadable file, or a segmented
/// multi-bitrate playlist that needs a streaming client to assemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
  Progressive,
  Adaptive,
}

impl SourceKind {
  pub fn label(self) -> &'static str {
    match self {
      SourceKind::Progressive => "progressive",
      SourceKind::Adaptive => "adaptive",
    }
  }
}

/// One playable variant of a video (quality/format).
#[derive(Debug, Clone, Deserialize)]
pub struct VideoSource {
  pub label: String,
  #[serde(rename = "type")]
  pub kind: SourceKind,
  pub uri: String,
}

/// A single catalog entry. The catalog is fixed for the lifetime of the
/// process; records are never created, updated, or deleted after load.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoItem {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  /// ISO-8601 date (`YYYY-MM-DD`).
  #[serde(default)]
  pub date: Option<String>,
  /// Pre-formatted display duration, e.g. `12:14`.
  #[serde(default)]
  pub duration: Option<String>,
  #[serde(default)]
  pub tags: Vec<String>,
  #[serde(default)]
  pub thumbnail_uri: Option<String>,
  /// Non-empty, ordered. The first source is the default when opened.
  pub sources: Vec<VideoSource>,
}

impl VideoItem {
  /// The ISO date reformatted for display (`May 20, 2008`), or the raw
  /// string if it doesn't parse.
  pub fn display_date(&self) -> Option<String> {
    let raw = self.date.as_deref()?;
    match chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
      Ok(d) => Some(d.format("%b %-d, %Y").to_string()),
      Err(_) => Some(raw.to_string()),
    }
  }
}

// --- Built-in catalog ---

static BUILTIN: LazyLock<Vec<VideoItem>> = LazyLock::new(|| {
  // Safety: the JSON file is embedded at compile time; if it's malformed this is caught
  // the first time the catalog is touched, before the UI starts.
  let items: Vec<VideoItem> =
    serde_json::from_str(include_str!("../catalog.json")).expect("catalog.json must be valid JSON (embedded at compile time)");
  validate(&items).expect("catalog.json must satisfy catalog invariants");
  items
});

/// The catalog embedded in the binary, used when no `--manifest` is given.
pub fn builtin() -> &'static [VideoItem] {
  &BUILTIN
}

/// Check catalog invariants: unique ids, non-empty source lists.
pub fn validate(items: &[VideoItem]) -> Result<()> {
  let mut seen = BTreeSet::new();
  for item in items {
    if item.sources.is_empty() {
      return Err(anyhow!("video `{}` has no sources", item.id));
    }
    if !seen.insert(item.id.as_str()) {
      return Err(anyhow!("duplicate video id `{}`", item.id));
    }
  }
  Ok(())
}

/// Find a catalog index by video id.
pub fn index_of(items: &[VideoItem], id: &str) -> Option<usize> {
  items.iter().position(|item| item.id == id)
}

// --- Filtering ---

/// Check whether an item matches an already-normalized (trimmed, lowercased)
/// query. Matches against title, description, and tags joined as text.
fn matches_query(item: &VideoItem, needle: &str) -> bool {
  if needle.is_empty() {
    return true;
  }
  if item.title.to_lowercase().contains(needle) {
    return true;
  }
  if let Some(ref desc) = item.description
    && desc.to_lowercase().contains(needle)
  {
    return true;
  }
  item.tags.join(" ").to_lowercase().contains(needle)
}

/// Check whether an item carries the given tag.
pub fn has_tag(item: &VideoItem, tag: &str) -> bool {
  item.tags.iter().any(|t| t == tag)
}

/// Compute the visible subset of the catalog for a query and an optional
/// active tag, as indices into `items` in original order.
///
/// Pure function of its inputs; cheap enough to rerun on every keystroke.
pub fn filter_indices(items: &[VideoItem], query: &str, active_tag: Option<&str>) -> Vec<usize> {
  let needle = query.trim().to_lowercase();
  items
    .iter()
    .enumerate()
    .filter(|(_, item)| matches_query(item, &needle))
    .filter(|(_, item)| active_tag.is_none_or(|tag| has_tag(item, tag)))
    .map(|(i, _)| i)
    .collect()
}

/// The tag vocabulary: the union of every item's tags, deduplicated and
/// sorted lexicographically for a stable display order.
pub fn distinct_tags(items: &[VideoItem]) -> Vec<String> {
  let set: BTreeSet<&str> = items.iter().flat_map(|item| item.tags.iter().map(String::as_str)).collect();
  set.into_iter().map(String::from).collect()
}
