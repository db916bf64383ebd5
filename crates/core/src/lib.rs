//! rtrack core types: view state, dataset status, analytics events and errors.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod taxonomy;

// ---------------- Dataset names (stable) ----------------
pub const COUNTRIES: &str = "countries";
pub const COUNTRIES_GRAMMAR: &str = "countriesGrammar";
pub const ESR_INDICATORS: &str = "esrIndicators";
pub const CPR_SCORES: &str = "cprScores";
pub const ESR_SCORES: &str = "esrScores";
pub const ESR_INDICATOR_SCORES: &str = "esrIndicatorScores";
pub const AUX_INDICATORS: &str = "auxIndicators";
pub const AT_RISK: &str = "atRisk";

/// Datasets a country report declares as required.
pub const COUNTRY_DEPENDENCIES: &[&str] = &[
    COUNTRIES,
    COUNTRIES_GRAMMAR,
    ESR_INDICATORS,
    CPR_SCORES,
    ESR_SCORES,
    ESR_INDICATOR_SCORES,
    AUX_INDICATORS,
    AT_RISK,
];

/// Datasets a single-metric ranking declares as required.
pub const METRIC_DEPENDENCIES: &[&str] = &[COUNTRIES, ESR_SCORES, CPR_SCORES, ESR_INDICATOR_SCORES];

/// Datasets a country list declares as required.
pub const COUNTRY_LIST_DEPENDENCIES: &[&str] = &[COUNTRIES];

// ---------------- Query parameter keys ----------------
pub const PARAM_TAB: &str = "tab";
pub const PARAM_SCALE: &str = "scale";
pub const PARAM_STANDARD: &str = "standard";
pub const PARAM_BENCHMARK: &str = "benchmark";
pub const PARAM_RAW: &str = "raw";

/// Page filter keys recognised by the query schema.
pub const FILTER_KEYS: &[&str] = &[
    "region", "subregion", "income", "oecd", "assessed", "featured", "treaty", "cprset", "esrset",
];

pub fn is_filter_key(key: &str) -> bool { FILTER_KEYS.contains(&key) }

/// Keys owned by the query schema (everything else is foreign and kept verbatim).
pub fn is_schema_key(key: &str) -> bool {
    matches!(key, PARAM_TAB | PARAM_SCALE | PARAM_STANDARD | PARAM_BENCHMARK | PARAM_RAW) || is_filter_key(key)
}

/// Load status of a dataset entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DatasetStatus {
    #[default]
    Unloaded,
    Loading,
    Ready,
    Failed,
}

impl DatasetStatus {
    /// Ready or Failed: no request outstanding for a first load.
    pub fn is_settled(self) -> bool { matches!(self, Self::Ready | Self::Failed) }
}

/// Active sub-view as addressed by the URL: either a position or a tab key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TabRef {
    Index(usize),
    Key(String),
}

impl fmt::Display for TabRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabRef::Index(i) => write!(f, "{}", i),
            TabRef::Key(k) => f.write_str(k),
        }
    }
}

/// Query parameters by key. Schema keys carry one value; foreign keys keep every value in order.
pub type Params = BTreeMap<String, Vec<String>>;

/// URL-serializable display state. Always derived by decoding a query string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewState {
    pub tab: Option<TabRef>,
    pub scale: String,
    pub standard: String,
    pub benchmark: String,
    pub raw: bool,
    /// Recognised page filters (`region`, `income`, ...).
    pub filters: BTreeMap<String, String>,
    /// Foreign parameters, preserved verbatim (repeats included) on re-encode.
    pub extra: BTreeMap<String, Vec<String>>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            tab: None,
            scale: taxonomy::DEFAULT_SCALE.to_string(),
            standard: taxonomy::DEFAULT_STANDARD.to_string(),
            benchmark: taxonomy::DEFAULT_BENCHMARK.to_string(),
            raw: false,
            filters: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl ViewState {
    pub fn filter(&self, key: &str) -> Option<&str> { self.filters.get(key).map(|s| s.as_str()) }

    pub fn with_tab(mut self, tab: Option<TabRef>) -> Self { self.tab = tab; self }

    pub fn with_filter(mut self, key: &str, value: &str) -> Self {
        self.filters.insert(key.to_string(), value.to_string());
        self
    }

    /// Flatten into per-key values, omitting defaults. Keys are in stable order.
    pub fn params(&self) -> Params {
        let mut out = Params::new();
        if let Some(tab) = &self.tab { out.insert(PARAM_TAB.to_string(), vec![tab.to_string()]); }
        if self.scale != taxonomy::DEFAULT_SCALE { out.insert(PARAM_SCALE.to_string(), vec![self.scale.clone()]); }
        if self.standard != taxonomy::DEFAULT_STANDARD { out.insert(PARAM_STANDARD.to_string(), vec![self.standard.clone()]); }
        if self.benchmark != taxonomy::DEFAULT_BENCHMARK { out.insert(PARAM_BENCHMARK.to_string(), vec![self.benchmark.clone()]); }
        if self.raw { out.insert(PARAM_RAW.to_string(), vec!["true".to_string()]); }
        for (k, v) in self.filters.iter() { out.insert(k.clone(), vec![v.clone()]); }
        for (k, vs) in self.extra.iter().filter(|(_, vs)| !vs.is_empty()) { out.insert(k.clone(), vs.clone()); }
        out
    }
}

/// Analytics event emitted after a navigation resolves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackEvent {
    pub category: String,
    pub action: String,
    pub value: Option<String>,
}

impl TrackEvent {
    pub fn new(category: impl Into<String>, action: impl Into<String>) -> Self {
        Self { category: category.into(), action: action.into(), value: None }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self { self.value = Some(value.into()); self }
}

/// Conditions the view-state layer recognises. None of them are fatal to a render.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ViewError {
    #[error("data unavailable: {0}")]
    DataUnavailable(String),
    #[error("data load failed: {dataset}: {reason}")]
    DataLoadFailed { dataset: String, reason: String },
    #[error("malformed query param {key}={value}")]
    MalformedQueryParam { key: String, value: String },
    #[error("unknown entity key: {0}")]
    UnknownEntityKey(String),
}

pub mod prelude {
    pub use super::taxonomy::{Dimension, Family, IndicatorSpec, RightSpec};
    pub use super::{DatasetStatus, Params, TabRef, TrackEvent, ViewError, ViewState};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_has_no_params() {
        assert!(ViewState::default().params().is_empty());
    }

    #[test]
    fn params_skip_defaults_and_keep_foreign() {
        let mut v = ViewState::default().with_filter("region", "europe-central-asia");
        v.benchmark = "best".into();
        v.extra.insert("utm_source".into(), vec!["mail".into(), "web".into()]);
        let p = v.params();
        let keys: Vec<&str> = p.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["benchmark", "region", "utm_source"]);
        assert_eq!(p["utm_source"], vec!["mail".to_string(), "web".to_string()]);
    }

    #[test]
    fn schema_keys_cover_filters() {
        assert!(is_schema_key("income"));
        assert!(is_schema_key("tab"));
        assert!(!is_schema_key("utm_source"));
    }
}
