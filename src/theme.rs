use ratatui::style::Color;

/// A named color palette. Every UI element pulls its colors from here so the
/// whole interface re-skins when the theme changes.
pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub status: Color,
  pub error: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub const THEMES: [Theme; 4] = [
  Theme {
    name: "dusk",
    bg: Color::Rgb(24, 24, 37),
    fg: Color::Rgb(205, 214, 244),
    accent: Color::Rgb(203, 166, 247),
    muted: Color::Rgb(108, 112, 134),
    border: Color::Rgb(69, 71, 90),
    status: Color::Rgb(166, 227, 161),
    error: Color::Rgb(243, 139, 168),
    highlight_fg: Color::Rgb(30, 30, 46),
    highlight_bg: Color::Rgb(203, 166, 247),
    stripe_bg: Color::Rgb(30, 30, 46),
    key_fg: Color::Rgb(30, 30, 46),
    key_bg: Color::Rgb(137, 180, 250),
  },
  Theme {
    name: "paper",
    bg: Color::Rgb(239, 241, 245),
    fg: Color::Rgb(76, 79, 105),
    accent: Color::Rgb(136, 57, 239),
    muted: Color::Rgb(156, 160, 176),
    border: Color::Rgb(188, 192, 204),
    status: Color::Rgb(64, 160, 43),
    error: Color::Rgb(210, 15, 57),
    highlight_fg: Color::Rgb(239, 241, 245),
    highlight_bg: Color::Rgb(136, 57, 239),
    stripe_bg: Color::Rgb(230, 233, 239),
    key_fg: Color::Rgb(239, 241, 245),
    key_bg: Color::Rgb(30, 102, 245),
  },
  Theme {
    name: "forest",
    bg: Color::Rgb(35, 42, 46),
    fg: Color::Rgb(211, 198, 170),
    accent: Color::Rgb(167, 192, 128),
    muted: Color::Rgb(133, 146, 137),
    border: Color::Rgb(73, 80, 87),
    status: Color::Rgb(163, 190, 140),
    error: Color::Rgb(230, 126, 128),
    highlight_fg: Color::Rgb(35, 42, 46),
    highlight_bg: Color::Rgb(167, 192, 128),
    stripe_bg: Color::Rgb(45, 53, 59),
    key_fg: Color::Rgb(35, 42, 46),
    key_bg: Color::Rgb(127, 187, 179),
  },
  Theme {
    name: "mono",
    bg: Color::Rgb(16, 16, 16),
    fg: Color::Rgb(220, 220, 220),
    accent: Color::Rgb(255, 255, 255),
    muted: Color::Rgb(120, 120, 120),
    border: Color::Rgb(80, 80, 80),
    status: Color::Rgb(200, 200, 200),
    error: Color::Rgb(255, 110, 110),
    highlight_fg: Color::Rgb(16, 16, 16),
    highlight_bg: Color::Rgb(220, 220, 220),
    stripe_bg: Color::Rgb(28, 28, 28),
    key_fg: Color::Rgb(16, 16, 16),
    key_bg: Color::Rgb(160, 160, 160),
  },
];
