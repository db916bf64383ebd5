use rtrack_core::taxonomy::{self, Dimension};
use rtrack_core::{ViewState, COUNTRIES, COUNTRY_LIST_DEPENDENCIES, METRIC_DEPENDENCIES};
use rtrack_store::StoreSnapshot;
use serde::Serialize;
use tracing::{debug, warn};

use crate::options::{resolve_options, ResolvedOptions};
use crate::score::{Score, ScoreTables};
use crate::table::{self, Country};
use crate::Selected;

/// Whether a country passes the list filters in the view.
/// `region`, `subregion`, `income` and `oecd` apply; other filter keys are left to the render layer.
pub fn matches_filters(c: &Country, view: &ViewState) -> bool {
    if let Some(region) = view.filter("region") {
        if c.region.as_deref() != Some(region) { return false; }
    }
    if let Some(sub) = view.filter("subregion") {
        if c.subregion.as_deref() != Some(sub) { return false; }
    }
    if let Some(income) = view.filter("income") {
        match taxonomy::income_group_by_key(income) {
            Some(g) => {
                if c.income_group().map(|x| x.key) != Some(g.key) { return false; }
            }
            None => debug!(income = %income, "select: unknown income group filter ignored"),
        }
    }
    if let Some(oecd) = view.filter("oecd") {
        match oecd {
            "1" | "true" => if !c.oecd { return false; },
            "0" | "false" => if c.oecd { return false; },
            other => debug!(oecd = %other, "select: unknown oecd filter ignored"),
        }
    }
    true
}

/// Country list filtered by the view, sorted by code.
pub fn filter_countries(snap: &StoreSnapshot, view: &ViewState) -> Selected<Vec<Country>> {
    let readiness = snap.readiness(COUNTRY_LIST_DEPENDENCIES);
    if !readiness.pending.is_empty() {
        return Selected::NotReady { pending: readiness.pending };
    }
    let Some(payload) = snap.payload(COUNTRIES) else { return Selected::Absent };
    let mut out: Vec<Country> = table::countries(payload).into_iter().filter(|c| matches_filters(c, view)).collect();
    out.sort_by(|a, b| a.code.cmp(&b.code));
    Selected::Ready(out)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedCountry {
    /// 1-based; equal values share a rank.
    pub rank: usize,
    pub country: String,
    pub score: Score,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricViewModel {
    pub metric: &'static str,
    pub dimension: Dimension,
    pub options: ResolvedOptions,
    pub year: Option<i32>,
    pub ranking: Vec<RankedCountry>,
    pub degraded: Vec<String>,
}

/// Ranking of every (filtered) country for one metric.
pub fn metric_view_model(snap: &StoreSnapshot, view: &ViewState, metric_code: &str) -> Selected<MetricViewModel> {
    let readiness = snap.readiness(METRIC_DEPENDENCIES);
    if !readiness.pending.is_empty() {
        return Selected::NotReady { pending: readiness.pending };
    }
    let Some(metric) = taxonomy::metric_for(metric_code) else {
        warn!(metric = %metric_code, "select: unknown metric");
        return Selected::Absent;
    };
    let options: ResolvedOptions = resolve_options(view);
    let tables = ScoreTables::from_snapshot(snap);
    let countries = snap.payload(COUNTRIES).map(table::countries).unwrap_or_default();

    let mut scored: Vec<(String, Score)> = countries
        .iter()
        .filter(|c| matches_filters(c, view))
        .filter_map(|c| tables.metric(&c.code, metric, &options).map(|s| (c.code.clone(), s)))
        .collect();
    scored.sort_by(|(ca, a), (cb, b)| match (a.value, b.value) {
        (Some(x), Some(y)) => y.total_cmp(&x).then_with(|| ca.cmp(cb)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => ca.cmp(cb),
    });

    let mut ranking: Vec<RankedCountry> = Vec::with_capacity(scored.len());
    for (i, (country, score)) in scored.into_iter().enumerate() {
        let rank = match ranking.last() {
            Some(prev) if prev.score.value.is_some() && prev.score.value == score.value => prev.rank,
            _ => i + 1,
        };
        ranking.push(RankedCountry { rank, country, score });
    }
    let year = ranking.first().map(|r| r.score.year);
    Selected::Ready(MetricViewModel {
        metric: metric.code(),
        dimension: metric.dimension(),
        options,
        year,
        ranking,
        degraded: readiness.failed,
    })
}
