//! Memoised parsed score tables and cross-country aggregates.
//!
//! Keys carry the generations of the source datasets, so a reload is
//! picked up without explicit invalidation; older generations are evicted.

use std::sync::{Arc, Mutex};

use rtrack_core::taxonomy::{Dimension, Family};
use rtrack_core::{CPR_SCORES, ESR_INDICATOR_SCORES, ESR_SCORES};
use rtrack_store::StoreSnapshot;
use rustc_hash::FxHashMap;
use serde::Serialize;
use smallvec::SmallVec;
use tracing::debug;

use crate::options::ResolvedOptions;
use crate::score::{benchmark_value, ScoreTables};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DimensionAverage {
    pub dimension: Dimension,
    pub value: Option<f64>,
    pub countries: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct AvgKey {
    esr_generation: u64,
    cpr_generation: u64,
    standard: &'static str,
    benchmark: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TablesKey {
    esr_generation: u64,
    indicator_generation: u64,
    cpr_generation: u64,
}

impl TablesKey {
    fn of(snap: &StoreSnapshot) -> Self {
        Self {
            esr_generation: snap.generation(ESR_SCORES),
            indicator_generation: snap.generation(ESR_INDICATOR_SCORES),
            cpr_generation: snap.generation(CPR_SCORES),
        }
    }
}

#[derive(Debug, Default)]
pub struct SelectorCache {
    tables: Mutex<Option<(TablesKey, Arc<ScoreTables>)>>,
    averages: Mutex<FxHashMap<AvgKey, Arc<Vec<DimensionAverage>>>>,
}

impl SelectorCache {
    pub fn new() -> Self { Self::default() }

    /// Parsed score tables; reparsed only when a source dataset's generation moves.
    pub fn score_tables(&self, snap: &StoreSnapshot) -> Arc<ScoreTables> {
        let key = TablesKey::of(snap);
        let hit = self
            .tables
            .lock()
            .ok()
            .and_then(|t| t.as_ref().filter(|(k, _)| *k == key).map(|(_, tables)| Arc::clone(tables)));
        if let Some(hit) = hit {
            metrics::counter!("selector_cache_hits_total", 1u64, "entry" => "tables");
            return hit;
        }
        metrics::counter!("selector_cache_misses_total", 1u64, "entry" => "tables");
        let parsed = Arc::new(ScoreTables::from_snapshot(snap));
        if let Ok(mut t) = self.tables.lock() {
            *t = Some((key, Arc::clone(&parsed)));
        }
        parsed
    }

    /// Number of memoised average sets.
    pub fn len(&self) -> usize { self.averages.lock().map(|m| m.len()).unwrap_or(0) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn dimension_averages(&self, snap: &StoreSnapshot, tables: &ScoreTables, opts: &ResolvedOptions) -> Arc<Vec<DimensionAverage>> {
        let key = AvgKey {
            esr_generation: snap.generation(ESR_SCORES),
            cpr_generation: snap.generation(CPR_SCORES),
            standard: opts.standard,
            benchmark: opts.benchmark,
        };
        if let Some(hit) = self.averages.lock().ok().and_then(|m| m.get(&key).cloned()) {
            metrics::counter!("selector_cache_hits_total", 1u64, "entry" => "averages");
            return hit;
        }
        metrics::counter!("selector_cache_misses_total", 1u64, "entry" => "averages");
        let computed = Arc::new(dimension_averages(tables, opts));
        if let Ok(mut m) = self.averages.lock() {
            let before = m.len();
            m.retain(|k, _| k.esr_generation == key.esr_generation && k.cpr_generation == key.cpr_generation);
            if m.len() < before {
                debug!(evicted = before - m.len(), "select: stale averages evicted");
            }
            m.insert(key, Arc::clone(&computed));
        }
        computed
    }
}

/// Mean dimension score across all countries for the latest year.
pub fn dimension_averages(tables: &ScoreTables, opts: &ResolvedOptions) -> Vec<DimensionAverage> {
    Dimension::ALL
        .into_iter()
        .map(|dimension| {
            let values: Vec<f64> = match dimension.family() {
                Family::Esr => {
                    let wanted = opts.standard_spec().code;
                    tables
                        .esr
                        .iter()
                        .filter(|r| Some(r.year) == tables.esr_year && r.metric == dimension.code())
                        .filter(|r| r.standard.eq_ignore_ascii_case(wanted))
                        .filter_map(|r| benchmark_value(&r.row, opts, &mut SmallVec::new()).0)
                        .collect()
                }
                Family::Cpr => tables
                    .cpr
                    .iter()
                    .filter(|r| Some(r.year) == tables.cpr_year && r.metric == dimension.code())
                    .filter_map(|r| r.mean)
                    .collect(),
            };
            let value = if values.is_empty() { None } else { Some(values.iter().sum::<f64>() / values.len() as f64) };
            DimensionAverage { dimension, value, countries: values.len() }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::resolve_options;
    use rtrack_core::ViewState;
    use rtrack_store::DatasetStore;
    use serde_json::json;

    fn seed(store: &DatasetStore, usa_esr: f64) {
        store.put_ready(
            ESR_SCORES,
            json!([
                {"country_code": "USA", "metric_code": "esr", "year": 2018, "standard": "Core", "score_adjusted": usa_esr},
                {"country_code": "CAN", "metric_code": "esr", "year": 2018, "standard": "Core", "score_adjusted": 90.0}
            ]),
        );
        store.put_ready(CPR_SCORES, json!([{"country_code": "USA", "metric_code": "physint", "year": 2018, "mean": 6.0}]));
    }

    #[test]
    fn averages_are_memoised_per_generation() {
        let store = DatasetStore::new();
        seed(&store, 80.0);
        let cache = SelectorCache::new();
        let opts = resolve_options(&ViewState::default());

        let snap = store.current();
        let tables = ScoreTables::from_snapshot(&snap);
        let a = cache.dimension_averages(&snap, &tables, &opts);
        assert_eq!(a[0].value, Some(85.0));
        assert_eq!(a[1].value, Some(6.0));
        assert_eq!(a[2].value, None);
        let b = cache.dimension_averages(&snap, &tables, &opts);
        assert!(Arc::ptr_eq(&a, &b));

        seed(&store, 70.0);
        let snap = store.current();
        let tables = ScoreTables::from_snapshot(&snap);
        let c = cache.dimension_averages(&snap, &tables, &opts);
        assert_eq!(c[0].value, Some(80.0));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn tables_reparsed_only_when_score_data_changes() {
        let store = DatasetStore::new();
        seed(&store, 80.0);
        let cache = SelectorCache::new();

        let a = cache.score_tables(&store.current());
        assert_eq!(a.esr.len(), 2);
        let b = cache.score_tables(&store.current());
        assert!(Arc::ptr_eq(&a, &b));

        store.put_ready("countries", json!([{"country_code": "USA"}]));
        let c = cache.score_tables(&store.current());
        assert!(Arc::ptr_eq(&a, &c), "unrelated dataset must not invalidate tables");

        seed(&store, 70.0);
        let d = cache.score_tables(&store.current());
        assert!(!Arc::ptr_eq(&a, &d));
        let usa = d.esr.iter().find(|r| r.country == "USA").unwrap();
        assert_eq!(crate::table::num(usa.row.get("score_adjusted")), Some(70.0));
    }
}
