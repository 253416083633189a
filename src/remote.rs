//! Remote resources: the optional catalog manifest and thumbnail images.
//!
//! The manifest is fetched exactly once at startup (`--manifest`); thumbnails
//! are prefetched in the background with bounded concurrency and streamed to
//! the app as they arrive.

use anyhow::{Context, Result, anyhow};
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use reqwest::Client;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::catalog::{self, VideoItem};
use crate::constants::constants;

fn is_url(source: &str) -> bool {
  source.starts_with("http://") || source.starts_with("https://")
}

/// Load a catalog manifest from a local path or over HTTP. A single GET, no
/// retries; the manifest is a JSON array shaped exactly like the embedded
/// catalog.
pub async fn load_manifest(client: &Client, source: &str) -> Result<Vec<VideoItem>> {
  let items: Vec<VideoItem> = if is_url(source) {
    info!(url = %source, "fetching catalog manifest");
    let response = client
      .get(source)
      .timeout(Duration::from_secs(constants().manifest_timeout_secs))
      .send()
      .await
      .with_context(|| format!("Failed to fetch manifest from {}", source))?;
    if !response.status().is_success() {
      return Err(anyhow!("manifest request failed with status {}", response.status()));
    }
    response.json().await.context("Failed to parse manifest JSON")?
  } else {
    let content = tokio::fs::read_to_string(source).await.with_context(|| format!("Failed to read manifest file {}", source))?;
    serde_json::from_str(&content).context("Failed to parse manifest JSON")?
  };

  catalog::validate(&items).context("Manifest violates catalog invariants")?;
  Ok(items)
}

/// Fetch and decode a single thumbnail image.
pub async fn fetch_thumbnail(client: &Client, uri: &str) -> Result<DynamicImage> {
  let response = client
    .get(uri)
    .timeout(Duration::from_secs(constants().thumbnail_timeout_secs))
    .send()
    .await
    .with_context(|| format!("Failed to fetch thumbnail from {}", uri))?;
  if !response.status().is_success() {
    return Err(anyhow!("thumbnail request failed with status {}", response.status()));
  }
  let bytes = response.bytes().await.with_context(|| format!("Failed to read image bytes from {}", uri))?;
  image::load_from_memory(&bytes).with_context(|| format!("Failed to decode image from {}", uri))
}

/// Prefetch thumbnails for the whole catalog. Runs a bounded number of
/// fetches concurrently; each decoded image is sent through `tx` as it
/// becomes available. Failures are logged and skipped: a missing thumbnail
/// only costs the card its picture.
pub async fn prefetch_thumbnails(client: Client, entries: Vec<(String, String)>, tx: mpsc::Sender<(String, DynamicImage)>) {
  stream::iter(entries)
    .map(|(id, uri)| {
      let client = client.clone();
      let tx = tx.clone();
      async move {
        match fetch_thumbnail(&client, &uri).await {
          Ok(image) => {
            let _ = tx.send((id, image)).await;
          }
          Err(e) => {
            debug!(id = %id, err = %format!("{:#}", e), "thumbnail prefetch failed");
          }
        }
      }
    })
    .buffer_unordered(constants().thumbnail_concurrency)
    .collect::<()>()
    .await;
}

#[cfg(test)]
mod tests {
  use super::*;

  const MANIFEST: &str = r#"[
    {
      "id": "clip",
      "title": "A Clip",
      "tags": ["demo"],
      "sources": [
        { "label": "720p", "type": "progressive", "uri": "https://example.com/clip.mp4" },
        { "label": "Adaptive", "type": "adaptive", "uri": "https://example.com/clip.m3u8" }
      ]
    }
  ]"#;

  // --- load_manifest ---

  #[tokio::test]
  async fn load_manifest_from_file() {
    let path = std::env::temp_dir().join(format!("reel-manifest-test-{}.json", std::process::id()));
    tokio::fs::write(&path, MANIFEST).await.unwrap();

    let client = Client::new();
    let items = load_manifest(&client, path.to_str().unwrap()).await.unwrap();
    let _ = tokio::fs::remove_file(&path).await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "clip");
    assert_eq!(items[0].sources.len(), 2);
    assert_eq!(items[0].sources[0].kind, catalog::SourceKind::Progressive);
    assert_eq!(items[0].sources[1].kind, catalog::SourceKind::Adaptive);
    // optional fields default cleanly
    assert!(items[0].description.is_none());
    assert!(items[0].thumbnail_uri.is_none());
  }

  #[tokio::test]
  async fn load_manifest_rejects_invalid_catalog() {
    let path = std::env::temp_dir().join(format!("reel-manifest-bad-{}.json", std::process::id()));
    tokio::fs::write(&path, r#"[{ "id": "x", "title": "X", "sources": [] }]"#).await.unwrap();

    let client = Client::new();
    let result = load_manifest(&client, path.to_str().unwrap()).await;
    let _ = tokio::fs::remove_file(&path).await;

    assert!(result.is_err());
  }

  #[tokio::test]
  async fn load_manifest_missing_file_errors() {
    let client = Client::new();
    assert!(load_manifest(&client, "/nonexistent/reel-manifest.json").await.is_err());
  }
}
