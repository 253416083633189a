//! The navigation surface: two logical views, addressed by path.
//!
//! `/` is the library; `/video/{id}` is the detail view for one catalog
//! entry. Anything else, including a well-formed path with an unknown id,
//! resolves to an inline "not found" state rather than an error.

use crate::catalog::{self, VideoItem};

// --- Routes ---

/// A parsed path. Parsing is independent of the catalog; resolution against
/// the catalog happens in [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
  Library,
  Detail(String),
}

impl Route {
  /// Parse a path into a route, or `None` for an unrecognized shape.
  pub fn parse(path: &str) -> Option<Route> {
    let trimmed = path.trim();
    let trimmed = trimmed.strip_suffix('/').filter(|s| !s.is_empty()).unwrap_or(trimmed);

    if trimmed.is_empty() || trimmed == "/" {
      return Some(Route::Library);
    }

    let id = trimmed.strip_prefix("/video/")?;
    if id.is_empty() || id.contains('/') {
      return None;
    }
    Some(Route::Detail(id.to_string()))
  }
}

// --- Views ---

/// What is on screen. `Detail` carries a resolved catalog index, so every
/// downstream consumer can index the catalog without re-checking the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
  Library,
  Detail(usize),
  NotFound(String),
}

/// Resolve a path against the catalog.
pub fn resolve(path: &str, items: &[VideoItem]) -> View {
  match Route::parse(path) {
    Some(Route::Library) => View::Library,
    Some(Route::Detail(id)) => match catalog::index_of(items, &id) {
      Some(idx) => View::Detail(idx),
      None => View::NotFound(id),
    },
    None => View::NotFound(path.trim().to_string()),
  }
}
