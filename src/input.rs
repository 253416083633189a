use anyhow::Result;
use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::{App, AppMode};
use crate::route::View;

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

// --- Event Handling ---

pub async fn handle_key_event(app: &mut App, key: event::KeyEvent) -> Result<()> {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return Ok(());
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('t') {
    app.next_theme();
    return Ok(());
  }

  match app.view {
    View::Library => match app.mode {
      AppMode::Search => handle_search_key(app, key),
      AppMode::Browse => handle_browse_key(app, key),
    },
    View::Detail(_) => handle_detail_key(app, key).await,
    View::NotFound(_) => handle_not_found_key(app, key),
  }
  Ok(())
}

fn handle_search_key(app: &mut App, key: event::KeyEvent) {
  app.clear_error();
  match key.code {
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&app.query, app.cursor);
      app.query.insert(byte_idx, c);
      app.cursor += 1;
      app.recompute_filter();
    }
    KeyCode::Backspace => {
      if app.cursor > 0 {
        app.cursor -= 1;
        let byte_idx = char_to_byte_index(&app.query, app.cursor);
        app.query.remove(byte_idx);
        app.recompute_filter();
      }
    }
    KeyCode::Delete => {
      if app.cursor < app.query.chars().count() {
        let byte_idx = char_to_byte_index(&app.query, app.cursor);
        app.query.remove(byte_idx);
        app.recompute_filter();
      }
    }
    KeyCode::Left => {
      app.cursor = app.cursor.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.cursor < app.query.chars().count() {
        app.cursor += 1;
      }
    }
    KeyCode::Home => {
      app.cursor = 0;
    }
    KeyCode::End => {
      app.cursor = app.query.chars().count();
    }
    KeyCode::Tab => {
      app.cycle_tag();
    }
    KeyCode::Enter | KeyCode::Down => {
      if !app.filtered_indices.is_empty() {
        app.mode = AppMode::Browse;
      }
    }
    KeyCode::Esc => {
      if !app.query.is_empty() {
        app.query.clear();
        app.cursor = 0;
        app.input_scroll = 0;
        app.recompute_filter();
      } else {
        app.should_quit = true;
      }
    }
    _ => {}
  }
}

fn handle_browse_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Enter => {
      app.open_selected();
    }
    KeyCode::Char('/') => {
      app.mode = AppMode::Search;
    }
    KeyCode::Tab => {
      app.cycle_tag();
    }
    KeyCode::Down | KeyCode::Char('j') => {
      let count = app.filtered_indices.len();
      if count > 0 {
        let i = app.list_state.selected().map_or(0, |i| (i + 1) % count);
        app.list_state.select(Some(i));
      }
    }
    KeyCode::Up | KeyCode::Char('k') => {
      let count = app.filtered_indices.len();
      if count > 0 {
        let i = app.list_state.selected().map_or(0, |i| if i == 0 { count - 1 } else { i - 1 });
        app.list_state.select(Some(i));
      }
    }
    KeyCode::Esc => {
      app.mode = AppMode::Search;
    }
    _ => {}
  }
}

async fn handle_detail_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    // Number keys pick a source; out-of-range presses are ignored by the session.
    KeyCode::Char(c @ '1'..='9') => {
      let index = c as usize - '1' as usize;
      app.select_source(index);
    }
    KeyCode::Char(' ') => {
      if app.session.as_ref().is_some_and(|s| s.ready()) {
        app.toggle_pause().await;
      }
    }
    KeyCode::Char('r') => {
      // Re-attach the active source: the manual retry for a failed stream.
      if let Some(index) = app.session.as_ref().map(|s| s.active_source_index()) {
        app.select_source(index);
      }
    }
    KeyCode::Esc => {
      app.close_detail();
    }
    _ => {}
  }
}

fn handle_not_found_key(app: &mut App, key: event::KeyEvent) {
  if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
    app.view = View::Library;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  // --- char_to_byte_index ---

  #[test]
  fn char_to_byte_ascii() {
    assert_eq!(char_to_byte_index("hello", 0), 0);
    assert_eq!(char_to_byte_index("hello", 3), 3);
    assert_eq!(char_to_byte_index("hello", 5), 5); // past end
  }

  #[test]
  fn char_to_byte_multibyte() {
    let s = "aé日"; // a=1 byte, é=2 bytes, 日=3 bytes
    assert_eq!(char_to_byte_index(s, 0), 0); // 'a'
    assert_eq!(char_to_byte_index(s, 1), 1); // 'é' starts at byte 1
    assert_eq!(char_to_byte_index(s, 2), 3); // '日' starts at byte 3
    assert_eq!(char_to_byte_index(s, 3), 6); // past end
  }

  #[test]
  fn char_to_byte_empty() {
    assert_eq!(char_to_byte_index("", 0), 0);
    assert_eq!(char_to_byte_index("", 5), 0);
  }
}
