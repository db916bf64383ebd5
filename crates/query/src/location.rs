use std::fmt;

use rtrack_core::ViewState;
use serde::{Deserialize, Serialize};

/// Address-bar location: normalised path plus query string (no leading `?`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Location {
    pub path: String,
    pub query: String,
}

impl Location {
    pub fn new(path: &str, query: &str) -> Self {
        Self { path: normalize_path(path), query: query.strip_prefix('?').unwrap_or(query).to_string() }
    }

    /// Parse `path[?query][#fragment]`; the fragment is not part of view state and is dropped.
    pub fn parse(href: &str) -> Self {
        let href = href.split('#').next().unwrap_or("");
        match href.split_once('?') {
            Some((path, query)) => Self::new(path, query),
            None => Self::new(href, ""),
        }
    }

    pub fn href(&self) -> String {
        if self.query.is_empty() { self.path.clone() } else { format!("{}?{}", self.path, self.query) }
    }

    pub fn view_state(&self) -> ViewState { crate::decode(&self.query) }

    pub fn segments(&self) -> impl Iterator<Item = &str> { self.path.split('/').filter(|s| !s.is_empty()) }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.href()) }
}

fn normalize_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if parts.is_empty() { "/".to_string() } else { format!("/{}", parts.join("/")) }
}
