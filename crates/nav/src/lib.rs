//! rtrack navigation: intents, routes, tab state and the navigator itself.
//!
//! Every URL change goes through [`Navigator`]. Callers build a
//! [`NavigationIntent`] (or a tab/locale command) and hand it over by value.

#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use rtrack_core::{TrackEvent, FILTER_KEYS, PARAM_RAW};
use serde::{Deserialize, Serialize};

mod analytics;
mod navigator;
mod route;
mod tabs;

pub use analytics::{Analytics, History, MemoryHistory, NoopAnalytics, TracingAnalytics};
pub use navigator::{resolve, Navigator};
pub use route::{is_app_locale, Page, PageKind, Route, APP_LOCALES, DEFAULT_LOCALE};
pub use tabs::{tabs_for, TabMachine};

/// A requested URL change. Consumed exactly once by [`Navigator::navigate`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavigationIntent {
    /// Target path, optionally with `?query`.
    pub target: String,
    pub keep_tab: bool,
    pub delete_params: BTreeSet<String>,
    pub track_event: Option<TrackEvent>,
}

impl NavigationIntent {
    pub fn to(target: impl Into<String>) -> Self {
        Self { target: target.into(), keep_tab: false, delete_params: BTreeSet::new(), track_event: None }
    }

    pub fn keep_tab(mut self, keep: bool) -> Self { self.keep_tab = keep; self }

    pub fn delete<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.delete_params.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn track(mut self, event: TrackEvent) -> Self { self.track_event = Some(event); self }
}

/// Select a tab on the current page by position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetTabCommand {
    pub index: usize,
}

/// Switch the UI locale, keeping page and query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetLocaleCommand {
    pub locale: String,
}

/// Toggle raw indicator values on the current page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetRawCommand {
    pub raw: bool,
}

impl SetRawCommand {
    /// Stays on the current page and tab; `raw=false` is the default so it is deleted.
    pub fn intent(self, current: &rtrack_query::Location) -> NavigationIntent {
        if self.raw {
            NavigationIntent::to(format!("{}?{}=true", current.path, PARAM_RAW)).keep_tab(true)
        } else {
            NavigationIntent::to(current.path.clone()).keep_tab(true).delete([PARAM_RAW])
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum NavError {
    #[error("tab index {index} out of range for {page} ({count} tabs)")]
    TabOutOfRange { page: &'static str, index: usize, count: usize },
    #[error("unknown locale: {0}")]
    UnknownLocale(String),
}

/// Country category click: jump to the country list filtered by `key=value`.
/// Other filters are cleared; `key == "all"` clears every filter.
pub fn country_filter_intent(key: &str, value: &str) -> NavigationIntent {
    let target = if key == "all" {
        format!("/{}", route::PATH_COUNTRIES)
    } else {
        let q = rtrack_query::serialize(&[(key.to_string(), vec![value.to_string()])].into_iter().collect());
        format!("/{}?{}", route::PATH_COUNTRIES, q)
    };
    NavigationIntent::to(target)
        .delete(FILTER_KEYS.iter().filter(|k| **k != key).copied())
        .track(TrackEvent::new("Data", "Country filter (Country, tags)").with_value(format!("{}/{}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_fields() {
        let i = NavigationIntent::to("/metrics").keep_tab(true).delete(["income", "region"]);
        assert!(i.keep_tab);
        assert_eq!(i.delete_params.len(), 2);
        assert!(i.track_event.is_none());
    }

    #[test]
    fn raw_command_sets_or_deletes_flag() {
        let here = rtrack_query::Location::parse("/es/country/USA?raw=true&tab=2");
        let on = SetRawCommand { raw: true }.intent(&here);
        assert_eq!(on.target, "/es/country/USA?raw=true");
        assert!(on.keep_tab);
        let off = SetRawCommand { raw: false }.intent(&here);
        assert_eq!(off.target, "/es/country/USA");
        assert!(off.delete_params.contains("raw"));
    }

    #[test]
    fn country_filter_keeps_own_key() {
        let i = country_filter_intent("income", "hi");
        assert_eq!(i.target, "/countries?income=hi");
        assert!(!i.delete_params.contains("income"));
        assert!(i.delete_params.contains("region"));
        assert_eq!(i.track_event.and_then(|e| e.value).as_deref(), Some("income/hi"));
        assert_eq!(country_filter_intent("all", "").target, "/countries");
    }
}
