mod app;
mod catalog;
mod config;
mod constants;
mod display;
mod hls;
mod input;
mod playback;
mod player;
mod remote;
mod route;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use app::App;
use constants::constants;
use display::CliDisplayMode;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Thumbnail display mode: 'auto', 'direct', or 'ascii' (default: auto-detect)
  #[arg(short, long, default_value = "auto")]
  display_mode: CliDisplayMode,

  /// Load the catalog from a JSON manifest (file path or http(s) URL) instead of the built-in one
  #[arg(short, long)]
  manifest: Option<String>,

  /// Start at a path: `/` for the library, `/video/{id}` for one video
  #[arg(short, long)]
  open: Option<String>,

  /// Print shell completions and exit
  #[arg(long, value_enum)]
  completions: Option<Shell>,
}

// --- Logging ---

/// Route tracing output to a rolling file in the data dir, since stdout
/// belongs to the terminal UI. Returns the guard that flushes on drop.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
  let proj_dirs = directories::ProjectDirs::from("", "", "reel")?;
  let log_dir = proj_dirs.data_dir().join("logs");
  std::fs::create_dir_all(&log_dir).ok()?;

  let appender = tracing_appender::rolling::daily(log_dir, "reel.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(writer)
    .with_ansi(false)
    .init();
  Some(guard)
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(shell) = args.completions {
    let mut cmd = Args::command();
    clap_complete::generate(shell, &mut cmd, "reel", &mut std::io::stdout());
    return Ok(());
  }

  let _log_guard = init_logging();

  // Resolve the catalog before the terminal takes over, so load errors
  // print normally.
  let catalog_items = match args.manifest {
    Some(ref source) => {
      let http_client = reqwest::Client::new();
      remote::load_manifest(&http_client, source).await.context("Failed to load catalog manifest")?
    }
    None => catalog::builtin().to_vec(),
  };

  let caps = player::probe_element();
  info!(videos = catalog_items.len(), player_available = caps.available, "starting");

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, args, catalog_items, caps).await;
  ratatui::restore();
  result
}

async fn run(
  terminal: &mut DefaultTerminal,
  args: Args,
  catalog_items: Vec<catalog::VideoItem>,
  caps: player::ElementCaps,
) -> Result<()> {
  let display_mode = display::resolve_display_mode(args.display_mode);
  let mut app = App::new(catalog_items, display_mode, caps);
  app.start_thumbnail_prefetch();
  if let Some(ref path) = args.open {
    app.open_path(path);
  }

  loop {
    app.check_pending();
    app.check_player_status();
    app.expire_error();

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if event::poll(Duration::from_millis(constants().tick_ms))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key).await?;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  app.shutdown();
  Ok(())
}
