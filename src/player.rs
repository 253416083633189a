//! The playback element: a thin wrapper around an external mpv process.
//!
//! The element knows nothing about the catalog or the session state machine;
//! it accepts a URI, reports status lines, and releases its process on
//! `clear`. Capability probes run once at startup and are carried on the
//! element, so the attach logic never shells out mid-session.

use anyhow::{Context, Result, anyhow};
use std::process::Stdio;
use tokio::{
  io::{AsyncBufReadExt, BufReader as TokioBufReader},
  process::{Child as TokioChild, Command},
  sync::mpsc,
  task::JoinHandle,
};
use tracing::{debug, warn};

use crate::constants::constants;

// --- Capability probes ---

/// What the playback element on this machine can do, probed once at startup.
#[derive(Debug, Clone, Copy)]
pub struct ElementCaps {
  /// The player binary exists and answers `--version`.
  pub available: bool,
  /// The player natively demuxes HLS playlists (protocol probe, not a
  /// file-extension check).
  pub native_playlists: bool,
}

/// Probe the configured player binary. Runs synchronously before the UI
/// starts; both answers are cached on the returned struct.
pub fn probe_element() -> ElementCaps {
  let bin = &constants().player_bin;

  let available = std::process::Command::new(bin)
    .arg("--version")
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .status()
    .map(|s| s.success())
    .unwrap_or(false);

  let native_playlists = available
    && std::process::Command::new(bin)
      .args(["--no-config", "--list-protocols"])
      .stdin(Stdio::null())
      .stderr(Stdio::null())
      .output()
      .ok()
      .map(|out| String::from_utf8_lossy(&out.stdout).contains("hls"))
      .unwrap_or(false);

  debug!(available, native_playlists, bin = %bin, "probed playback element");
  ElementCaps { available, native_playlists }
}

// --- Element ---

pub struct Player {
  caps: ElementCaps,
  process: Option<TokioChild>,
  monitor_handle: Option<JoinHandle<()>>,
  status_rx: Option<mpsc::Receiver<String>>,
  last_status: Option<String>,
  ipc_socket_path: Option<String>,
  assigned_uri: Option<String>,
  pub paused: bool,
}

impl Player {
  pub fn new(caps: ElementCaps) -> Self {
    Self {
      caps,
      process: None,
      monitor_handle: None,
      status_rx: None,
      last_status: None,
      ipc_socket_path: None,
      assigned_uri: None,
      paused: false,
    }
  }

  /// Drain buffered status lines from the player process.
  pub fn check_status(&mut self) {
    if let Some(rx) = &mut self.status_rx {
      while let Ok(status) = rx.try_recv() {
        self.last_status = Some(status);
      }
    }
  }

  pub fn last_status(&self) -> Option<String> {
    self.last_status.clone()
  }

  /// Point the element at a URI: spawn the player process and start the
  /// status monitor. Any previous assignment is released first.
  pub fn assign(&mut self, uri: &str) -> Result<()> {
    self.clear();

    let socket_path = std::env::temp_dir().join(format!("reel-mpv-{}.sock", std::process::id()));
    let socket_path_str = socket_path.to_str().context("Temp dir path is not valid UTF-8")?.to_string();
    // Remove stale socket if it exists from a previous crash.
    let _ = std::fs::remove_file(&socket_path);

    let mut cmd = Command::new(&constants().player_bin);
    cmd.args([
      "--term-status-msg=${time-pos/full} / ${duration/full} | ${pause} ${percent-pos}%",
      &format!("--input-ipc-server={}", socket_path_str),
      "--",
      uri,
    ]);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    // Send stderr to null — if piped but never drained, the pipe buffer
    // fills and the player blocks.
    cmd.stderr(Stdio::null());

    let mut child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("{} not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)", constants().player_bin)
      } else {
        anyhow!(e).context("Failed to spawn player process")
      }
    })?;

    let stdout = child.stdout.take().context("Failed to get player stdout")?;
    let (tx, rx) = mpsc::channel::<String>(10);
    self.status_rx = Some(rx);

    let monitor_handle = tokio::spawn(async move {
      let reader = TokioBufReader::new(stdout);
      let mut lines = reader.lines();
      while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
          break;
        }
      }
    });

    debug!(uri = %uri, "player: assigned source");
    self.process = Some(child);
    self.monitor_handle = Some(monitor_handle);
    self.ipc_socket_path = Some(socket_path_str);
    self.assigned_uri = Some(uri.to_string());
    self.paused = false;
    Ok(())
  }

  /// Release everything: monitor task, player process, IPC socket, and the
  /// assigned URI. Safe to call when nothing is attached.
  pub fn clear(&mut self) {
    if let Some(handle) = self.monitor_handle.take() {
      handle.abort();
    }
    self.status_rx = None;
    self.last_status = None;

    if let Some(mut child) = self.process.take() {
      if let Err(e) = child.start_kill() {
        warn!(err = %e, "player: failed to signal process");
      }
      // Reap in the background so teardown never blocks the event loop.
      tokio::spawn(async move {
        let _ = child.wait().await;
      });
    }

    if let Some(path) = self.ipc_socket_path.take() {
      let _ = std::fs::remove_file(&path);
    }
    self.assigned_uri = None;
    self.paused = false;
  }

  pub async fn toggle_pause(&mut self) -> Result<()> {
    let Some(ref socket_path) = self.ipc_socket_path else {
      return Ok(());
    };
    let stream =
      tokio::net::UnixStream::connect(socket_path).await.context("Failed to connect to player IPC socket")?;
    stream.writable().await.context("Player IPC socket not writable")?;
    let cmd = b"{\"command\":[\"cycle\",\"pause\"]}\n";
    let written = stream.try_write(cmd).context("Failed to send pause command to player")?;
    if written < cmd.len() {
      return Err(anyhow!("Partial write to player IPC socket: wrote {} of {} bytes", written, cmd.len()));
    }
    self.paused = !self.paused;
    Ok(())
  }
}

impl crate::playback::MediaElement for Player {
  fn assign(&mut self, uri: &str) -> Result<()> {
    Player::assign(self, uri)
  }

  fn clear(&mut self) {
    Player::clear(self);
  }

  fn assigned_uri(&self) -> Option<&str> {
    self.assigned_uri.as_deref()
  }

  fn supports_playlists(&self) -> bool {
    self.caps.native_playlists
  }
}

impl Drop for Player {
  fn drop(&mut self) {
    // Last-resort release for panics and early returns; the session's
    // teardown path normally runs clear() long before this.
    if let Some(mut child) = self.process.take() {
      let _ = child.start_kill();
    }
    if let Some(path) = self.ipc_socket_path.take() {
      let _ = std::fs::remove_file(&path);
    }
  }
}
