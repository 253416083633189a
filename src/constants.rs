//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available —
//! no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Event loop
  pub tick_ms: u64,
  pub error_dismiss_secs: u64,

  // Playback element
  pub player_bin: String,

  // Adaptive streaming
  pub hls_timeout_secs: u64,
  pub hls_bandwidth_budget: u64,

  // Remote resources
  pub manifest_timeout_secs: u64,
  pub thumbnail_timeout_secs: u64,
  pub thumbnail_concurrency: usize,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
