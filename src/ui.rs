use image::{DynamicImage, imageops::FilterType};
use ratatui::{
  Frame,
  buffer::Buffer,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Color, Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, List, ListItem, Padding, Paragraph, Widget, Wrap},
};

use crate::app::{App, AppMode};
use crate::catalog::VideoItem;
use crate::display::DisplayMode;
use crate::playback::PlaybackError;
use crate::route::View;
use crate::theme::Theme;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, tag_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, theme, header_area);
  render_tag_bar(frame, app, tag_area);
  render_main(frame, app, main_area);
  render_status(frame, app, status_area);
  render_input(frame, app, input_area);
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, theme: &Theme, area: Rect) {
  let left = Line::from(Span::styled(" ▶ reel ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_tag_bar(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let mut spans = vec![Span::raw(" ")];

  let all_active = app.active_tag.is_none();
  spans.push(chip("all", all_active, theme));
  spans.push(Span::raw(" "));

  for (i, tag) in app.tags.iter().enumerate() {
    spans.push(chip(tag, app.active_tag == Some(i), theme));
    spans.push(Span::raw(" "));
  }

  frame.render_widget(Line::from(spans), area);
}

fn chip<'a>(label: &'a str, active: bool, theme: &Theme) -> Span<'a> {
  let style = if active {
    Style::default().fg(theme.key_fg).bg(theme.key_bg).add_modifier(Modifier::BOLD)
  } else {
    Style::default().fg(theme.muted)
  };
  Span::styled(format!(" {} ", label), style)
}

fn render_main(frame: &mut Frame, app: &mut App, area: Rect) {
  match app.view.clone() {
    View::Library => render_library(frame, app, area),
    View::Detail(index) => render_detail(frame, app, area, index),
    View::NotFound(id) => render_not_found(frame, app.theme(), area, &id),
  }
}

fn render_library(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();

  let title = if app.filtered_indices.len() == app.catalog.len() {
    format!(" Library — {} videos ", app.catalog.len())
  } else {
    format!(" Library — {}/{} videos ", app.filtered_indices.len(), app.catalog.len())
  };
  let block = Block::bordered()
    .title(title)
    .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(theme.border));

  if app.filtered_indices.is_empty() {
    let text = vec![
      Line::from(""),
      Line::from(Span::styled("Nothing matches this search.", Style::default().fg(theme.fg))),
      Line::from(""),
      Line::from(Span::styled("Clear the query or cycle the tag with Tab.", Style::default().fg(theme.muted))),
    ];
    frame.render_widget(Paragraph::new(text).alignment(Alignment::Center).block(block), area);
    return;
  }

  // Inner width: area minus 2 borders minus 2 chars for highlight symbol ("▶ ")
  let inner_w = area.width.saturating_sub(4) as usize;

  let items: Vec<ListItem> = app
    .filtered_indices
    .iter()
    .enumerate()
    .map(|(i, &catalog_idx)| {
      let item = &app.catalog[catalog_idx];
      let is_selected = Some(i) == app.list_state.selected();
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let bg = if is_selected {
        theme.highlight_bg
      } else if i % 2 == 1 {
        theme.stripe_bg
      } else {
        theme.bg
      };

      ListItem::new(card_line(item, inner_w, fg, theme)).bg(bg)
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.list_state);
}

/// One card row: title on the left, "tags  duration  date" on the right.
fn card_line(item: &VideoItem, inner_w: usize, fg: Color, theme: &Theme) -> Line<'static> {
  let tags_str = item.tags.join(", ");
  let date_str = item.display_date().unwrap_or_default();
  let duration_str = item.duration.clone().unwrap_or_default();

  let right_parts: Vec<&str> =
    [tags_str.as_str(), duration_str.as_str(), date_str.as_str()].into_iter().filter(|s| !s.is_empty()).collect();
  let right = right_parts.join("  ");

  if right.is_empty() {
    return Line::from(Span::styled(truncate_str(&item.title, inner_w), Style::default().fg(fg)));
  }

  // Reserve space for the right side plus a 2-char gap
  let right_w = right.chars().count();
  let title_max = inner_w.saturating_sub(right_w + 2);
  let title = truncate_str(&item.title, title_max);
  let title_w = title.chars().count();
  let gap = inner_w.saturating_sub(title_w + right_w);

  Line::from(vec![
    Span::styled(title, Style::default().fg(fg)),
    Span::raw(" ".repeat(gap)),
    Span::styled(right, Style::default().fg(theme.muted)),
  ])
}

// --- Detail view ---

fn render_detail(frame: &mut Frame, app: &mut App, area: Rect, index: usize) {
  let [thumb_area, info_area] = Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)]).areas(area);
  render_thumb_pane(frame, app, thumb_area, index);
  render_detail_info(frame, app, info_area, index);
}

fn render_thumb_pane(frame: &mut Frame, app: &mut App, area: Rect, index: usize) {
  let theme = app.theme();
  let block = Block::bordered()
    .title(format!(" Preview [{}] ", app.display_mode.label().to_lowercase()))
    .title_style(Style::default().fg(theme.accent))
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(theme.border));
  let inner = block.inner(area);
  frame.render_widget(block, area);
  if inner.is_empty() {
    return;
  }

  let display_mode = app.display_mode;
  let App { catalog, thumbs, resized_thumb, .. } = app;
  let item = &catalog[index];

  let Some(image) = thumbs.get(&item.id) else {
    let placeholder = Paragraph::new(vec![
      Line::from(""),
      Line::from(Span::styled("▶", Style::default().fg(theme.muted))),
      Line::from(""),
      Line::from(Span::styled(
        if item.thumbnail_uri.is_some() { "loading thumbnail…" } else { "no thumbnail" },
        Style::default().fg(theme.muted),
      )),
    ])
    .alignment(Alignment::Center);
    frame.render_widget(placeholder, inner);
    return;
  };

  let needs_resize = match resized_thumb {
    Some((id, w, h, _)) => *id != item.id || *w != inner.width || *h != inner.height,
    None => true,
  };
  if needs_resize {
    // Two pixels per cell row; aspect-preserving fit, centered by the widget.
    let target_w = (inner.width as u32).max(1);
    let target_h = (inner.height as u32 * 2).max(1);
    let resized = image.resize(target_w, target_h, FilterType::Triangle);
    *resized_thumb = Some((item.id.clone(), inner.width, inner.height, resized));
  }

  if let Some((_, _, _, resized)) = &*resized_thumb {
    frame.render_widget(ThumbPane { image: resized, mode: display_mode }, inner);
  }
}

fn render_detail_info(frame: &mut Frame, app: &App, area: Rect, index: usize) {
  let theme = app.theme();
  let item = &app.catalog[index];
  let inner_w = area.width.saturating_sub(4) as usize;

  let block = Block::bordered()
    .title(" Now Playing ")
    .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(theme.border))
    .padding(Padding::horizontal(1));

  let mut lines = vec![
    Line::from(""),
    Line::from(Span::styled(truncate_str(&item.title, inner_w), Style::default().fg(theme.fg).add_modifier(Modifier::BOLD))),
  ];

  let mut meta: Vec<String> = Vec::new();
  if let Some(date) = item.display_date() {
    meta.push(date);
  }
  if let Some(ref duration) = item.duration {
    meta.push(duration.clone());
  }
  if !item.tags.is_empty() {
    meta.push(item.tags.join(", "));
  }
  if !meta.is_empty() {
    lines.push(Line::from(Span::styled(meta.join("  ·  "), Style::default().fg(theme.muted))));
  }
  lines.push(Line::from(""));

  if let Some(ref description) = item.description {
    lines.push(Line::from(Span::styled(description.clone(), Style::default().fg(theme.fg))));
    lines.push(Line::from(""));
  }

  lines.push(Line::from(Span::styled("Sources", Style::default().fg(theme.muted).add_modifier(Modifier::BOLD))));
  let active_source = app.session.as_ref().map(|s| s.active_source_index());
  for (i, source) in item.sources.iter().enumerate() {
    let is_active = active_source == Some(i);
    let marker = if is_active { "▶" } else { " " };
    let style =
      if is_active { Style::default().fg(theme.accent).add_modifier(Modifier::BOLD) } else { Style::default().fg(theme.fg) };
    lines.push(Line::from(vec![
      Span::styled(format!("{} {}. {}", marker, i + 1, source.label), style),
      Span::styled(format!("  {}", source.kind.label()), Style::default().fg(theme.muted)),
    ]));
  }

  lines.push(Line::from(""));
  lines.push(playback_state_line(app, theme));

  let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false }).block(block);
  frame.render_widget(paragraph, area);
}

/// The session's readiness as one line. Play affordances key off this: the
/// pause hint only appears once the session reports ready.
fn playback_state_line(app: &App, theme: &Theme) -> Line<'static> {
  let Some(ref session) = app.session else {
    return Line::from(Span::styled("○ No playback session", Style::default().fg(theme.muted)));
  };
  if let Some(error) = session.error() {
    let text = match error {
      PlaybackError::UnsupportedSource { .. } => format!("✕ Cannot play: {}", error),
      PlaybackError::StreamLoad { .. } => format!("⚠ {}", error),
    };
    return Line::from(Span::styled(text, Style::default().fg(theme.error)));
  }
  if session.attaching() {
    return Line::from(Span::styled("⏳ Loading stream…", Style::default().fg(theme.status)));
  }
  if session.ready() {
    let text = if session.element().paused {
      format!("⏸ Paused — {}", session.active_source().label)
    } else {
      format!("● Playing — {}", session.active_source().label)
    };
    return Line::from(Span::styled(text, Style::default().fg(theme.status)));
  }
  Line::from(Span::styled("○ Not ready", Style::default().fg(theme.muted)))
}

// --- Not-found view ---

fn render_not_found(frame: &mut Frame, theme: &Theme, area: Rect, id: &str) {
  let text = vec![
    Line::from(""),
    Line::from(Span::styled("⚠  Video not found", Style::default().fg(theme.error).add_modifier(Modifier::BOLD))),
    Line::from(""),
    Line::from(Span::styled(format!("Nothing in the catalog matches \"{}\".", id), Style::default().fg(theme.fg))),
    Line::from(""),
    Line::from(Span::styled("Press Esc to browse the library.", Style::default().fg(theme.muted))),
  ];
  let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
    Block::bordered()
      .border_type(ratatui::widgets::BorderType::Rounded)
      .border_style(Style::default().fg(theme.border)),
  );
  frame.render_widget(paragraph, area);
}

// --- Status / input / footer ---

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(msg) = &app.status_message {
    (format!(" ⏳ {}", msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else {
    match app.player_status_line() {
      Some(status) => (format!(" ♪ {}", status), Style::default().fg(theme.status)),
      None => (" Ready".to_string(), Style::default().fg(theme.muted)),
    }
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_input(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let focused = app.mode == AppMode::Search && app.view == View::Library;
  let border_color = if focused { theme.accent } else { theme.border };
  let input_block = Block::bordered()
    .title(" Search ")
    .title_style(Style::default().fg(border_color))
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&app.query, app.cursor);

  if cursor_col < app.input_scroll {
    app.input_scroll = cursor_col;
  } else if cursor_col >= app.input_scroll + inner_w {
    app.input_scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let visible: String = app
    .query
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= app.input_scroll)
    .take_while(|(start, _, _)| *start < app.input_scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(input_block);
  frame.render_widget(paragraph, area);

  if focused {
    let cursor_x = area.x + 2 + (cursor_col - app.input_scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let ready = app.session.as_ref().is_some_and(|s| s.ready());
  let keys: Vec<(&str, &str)> = match app.view {
    View::Library => match app.mode {
      AppMode::Search => {
        let mut k = vec![("↓", "Browse"), ("Tab", "Tag"), ("^t", "Theme")];
        if app.query.is_empty() {
          k.push(("Esc", "Quit"));
        } else {
          k.push(("Esc", "Clear"));
        }
        k
      }
      AppMode::Browse => {
        vec![("Enter", "Open"), ("j/k", "Navigate"), ("/", "Search"), ("Tab", "Tag"), ("^t", "Theme"), ("Esc", "Search")]
      }
    },
    View::Detail(_) => {
      let mut k = vec![("1-9", "Source")];
      if ready {
        let paused = app.session.as_ref().is_some_and(|s| s.element().paused);
        k.push(("Space", if paused { "Resume" } else { "Pause" }));
      }
      k.push(("r", "Reload"));
      k.push(("^t", "Theme"));
      k.push(("Esc", "Back"));
      k
    }
    View::NotFound(_) => vec![("Esc", "Library"), ("^t", "Theme")],
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

// --- Thumbnail pane ---

const ASCII_RAMP: &[u8] = b" .:-=+*#%@";

/// Renders a pre-resized thumbnail into the pane, centered. Direct mode
/// packs two pixel rows per cell with the upper-half-block glyph; ASCII mode
/// maps luminance onto a character ramp.
struct ThumbPane<'a> {
  image: &'a DynamicImage,
  mode: DisplayMode,
}

impl Widget for ThumbPane<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    if area.is_empty() {
      return;
    }
    match self.mode {
      DisplayMode::Direct => {
        let rgb = self.image.to_rgb8();
        let cols = rgb.width().min(area.width as u32) as u16;
        let rows = (rgb.height().div_ceil(2)).min(area.height as u32) as u16;
        let x0 = area.x + (area.width - cols) / 2;
        let y0 = area.y + (area.height - rows) / 2;
        for row in 0..rows {
          for col in 0..cols {
            let top = rgb.get_pixel(col as u32, row as u32 * 2);
            let fg = Color::Rgb(top[0], top[1], top[2]);
            let bottom_y = row as u32 * 2 + 1;
            let bg = if bottom_y < rgb.height() {
              let bottom = rgb.get_pixel(col as u32, bottom_y);
              Color::Rgb(bottom[0], bottom[1], bottom[2])
            } else {
              Color::Reset
            };
            buf.set_string(x0 + col, y0 + row, "▀", Style::default().fg(fg).bg(bg));
          }
        }
      }
      DisplayMode::Ascii => {
        let luma = self.image.to_luma8();
        let cols = luma.width().min(area.width as u32) as u16;
        let rows = (luma.height().div_ceil(2)).min(area.height as u32) as u16;
        let x0 = area.x + (area.width - cols) / 2;
        let y0 = area.y + (area.height - rows) / 2;
        for row in 0..rows {
          for col in 0..cols {
            let v = luma.get_pixel(col as u32, row as u32 * 2)[0] as usize;
            let idx = v * (ASCII_RAMP.len() - 1) / 255;
            let ch = ASCII_RAMP[idx] as char;
            buf.set_string(x0 + col, y0 + row, ch.to_string(), Style::default());
          }
        }
      }
    }
  }
}
