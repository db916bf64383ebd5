//! rtrack selectors: pure derivations from a store snapshot plus the URL view state.
//!
//! Nothing here mutates the store or the URL. Recomputing on every epoch is
//! safe; the one expensive aggregate (dimension averages) is memoised in a
//! [`SelectorCache`] keyed by dataset generations.

#![forbid(unsafe_code)]

use serde::Serialize;

pub mod cache;
pub mod country;
pub mod metric;
pub mod options;
pub mod score;
pub mod table;

pub use cache::{DimensionAverage, SelectorCache};
pub use country::{country_view_model, AtRiskGroup, AuxFact, CountryViewModel, RightAtRisk};
pub use metric::{filter_countries, metric_view_model, MetricViewModel, RankedCountry};
pub use options::{resolve_options, ResolvedOptions, Substitution};
pub use score::{Fallback, Score, ScoreTables};
pub use table::Country;

/// Outcome of a dependency-gated selection.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum Selected<T> {
    /// Some declared dependency is still Unloaded or Loading.
    NotReady { pending: Vec<String> },
    /// The requested entity does not exist.
    Absent,
    Ready(T),
}

impl<T> Selected<T> {
    pub fn is_ready(&self) -> bool { matches!(self, Selected::Ready(_)) }

    pub fn ready(self) -> Option<T> {
        match self {
            Selected::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ready(&self) -> Option<&T> {
        match self {
            Selected::Ready(v) => Some(v),
            _ => None,
        }
    }
}
