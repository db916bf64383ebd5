use rtrack_core::taxonomy::{self, Dimension, Family, IndicatorSpec, Metric};
use rtrack_core::{CPR_SCORES, ESR_INDICATOR_SCORES, ESR_SCORES};
use rtrack_store::StoreSnapshot;
use serde::Serialize;
use smallvec::SmallVec;
use tracing::debug;

use crate::options::ResolvedOptions;
use crate::table::{self, num, CprScore, EsrScore, IndicatorScore};

/// Why a score was read from somewhere other than the requested place.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Fallback {
    /// Requested benchmark column missing; default benchmark column used.
    Benchmark,
    /// No row for the requested standard; the Core row used.
    Standard,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Score {
    pub metric: &'static str,
    pub dimension: Dimension,
    pub year: i32,
    /// As delivered.
    pub value: Option<f64>,
    /// Clamped to the family's display range (raw indicator values are not clamped).
    pub display: Option<f64>,
    pub out_of_range: bool,
    pub column: &'static str,
    /// CPR uncertainty band.
    pub band: Option<(f64, f64)>,
    pub fallbacks: SmallVec<[Fallback; 2]>,
}

impl Score {
    fn ranged(metric: &'static str, dimension: Dimension, year: i32, value: Option<f64>, column: &'static str) -> Self {
        let (lo, hi) = dimension.family().display_range();
        let display = value.map(|v| v.clamp(lo, hi));
        let out_of_range = matches!((value, display), (Some(v), Some(d)) if v != d);
        if out_of_range {
            debug!(metric, value = ?value, lo, hi, "select: score outside display range; clamped");
            metrics::counter!("selector_out_of_range_total", 1u64, "family" => family_label(dimension.family()));
        }
        Self { metric, dimension, year, value, display, out_of_range, column, band: None, fallbacks: SmallVec::new() }
    }

    fn unranged(metric: &'static str, dimension: Dimension, year: i32, value: Option<f64>, column: &'static str) -> Self {
        Self { metric, dimension, year, value, display: value, out_of_range: false, column, band: None, fallbacks: SmallVec::new() }
    }

    pub fn has_fallback(&self) -> bool { !self.fallbacks.is_empty() }
}

fn family_label(f: Family) -> &'static str {
    match f {
        Family::Esr => "esr",
        Family::Cpr => "cpr",
    }
}

/// The score tables parsed from one snapshot. Shared through [`crate::SelectorCache`].
#[derive(Debug, Clone, Default)]
pub struct ScoreTables {
    pub esr: Vec<EsrScore>,
    pub indicators: Vec<IndicatorScore>,
    pub cpr: Vec<CprScore>,
    pub esr_year: Option<i32>,
    pub indicator_year: Option<i32>,
    pub cpr_year: Option<i32>,
}

impl ScoreTables {
    /// Missing or unready datasets parse as empty tables.
    pub fn from_snapshot(snap: &StoreSnapshot) -> Self {
        let esr = snap.payload(ESR_SCORES).map(table::esr_scores).unwrap_or_default();
        let indicators = snap.payload(ESR_INDICATOR_SCORES).map(table::indicator_scores).unwrap_or_default();
        let cpr = snap.payload(CPR_SCORES).map(table::cpr_scores).unwrap_or_default();
        Self {
            esr_year: table::latest_year(&esr, |r| r.year),
            indicator_year: table::latest_year(&indicators, |r| r.year),
            cpr_year: table::latest_year(&cpr, |r| r.year),
            esr,
            indicators,
            cpr,
        }
    }

    pub fn metric(&self, country: &str, metric: Metric, opts: &ResolvedOptions) -> Option<Score> {
        match metric {
            Metric::Indicator(spec) => self.indicator(country, spec, opts),
            m => match m.dimension().family() {
                Family::Esr => self.esr(country, m.code(), opts),
                Family::Cpr => self.cpr(country, m.code(), m.dimension()),
            },
        }
    }

    /// ESR dimension or right score, honouring standard and benchmark with fallback.
    pub fn esr(&self, country: &str, metric: &'static str, opts: &ResolvedOptions) -> Option<Score> {
        let year = self.esr_year?;
        let candidates: Vec<&EsrScore> =
            self.esr.iter().filter(|r| r.year == year && r.metric == metric && r.country == country).collect();
        let mut fallbacks: SmallVec<[Fallback; 2]> = SmallVec::new();
        let wanted = opts.standard_spec().code;
        let row = match candidates.iter().find(|r| r.standard.eq_ignore_ascii_case(wanted)) {
            Some(r) => *r,
            None => {
                fallbacks.push(Fallback::Standard);
                let core = taxonomy::default_standard().code;
                candidates.iter().find(|r| r.standard.eq_ignore_ascii_case(core)).or(candidates.first()).copied()?
            }
        };
        let (value, column) = benchmark_value(&row.row, opts, &mut fallbacks);
        let dimension = taxonomy::metric_for(metric).map(|m| m.dimension()).unwrap_or(Dimension::Esr);
        let mut s = Score::ranged(metric, dimension, year, value, column);
        s.fallbacks = fallbacks;
        Some(s)
    }

    /// Indicator score; `raw` exposes the unbenchmarked value column.
    pub fn indicator(&self, country: &str, spec: &'static IndicatorSpec, opts: &ResolvedOptions) -> Option<Score> {
        let year = self.indicator_year?;
        let row = self.indicators.iter().find(|r| r.year == year && r.indicator.code == spec.code && r.country == country)?;
        if opts.raw {
            let value = num(row.row.get(taxonomy::RAW_COLUMN));
            return Some(Score::unranged(spec.code, Dimension::Esr, year, value, taxonomy::RAW_COLUMN));
        }
        let mut fallbacks = SmallVec::new();
        let (value, column) = benchmark_value(&row.row, opts, &mut fallbacks);
        let mut s = Score::ranged(spec.code, Dimension::Esr, year, value, column);
        s.fallbacks = fallbacks;
        Some(s)
    }

    /// CPR score: mean with band; benchmark and standard do not apply.
    pub fn cpr(&self, country: &str, metric: &'static str, dimension: Dimension) -> Option<Score> {
        let year = self.cpr_year?;
        let row = self.cpr.iter().find(|r| r.year == year && r.metric == metric && r.country == country)?;
        let mut s = Score::ranged(metric, dimension, year, row.mean, taxonomy::CPR_MEAN_COLUMN);
        if let (Some(lo), Some(hi)) = (row.lower, row.upper) {
            s.band = Some((lo, hi));
        }
        Some(s)
    }
}

pub(crate) fn benchmark_value(
    row: &serde_json::Map<String, serde_json::Value>,
    opts: &ResolvedOptions,
    fallbacks: &mut SmallVec<[Fallback; 2]>,
) -> (Option<f64>, &'static str) {
    let column = opts.benchmark_spec().column;
    if let Some(v) = num(row.get(column)) {
        return (Some(v), column);
    }
    let default_column = taxonomy::default_benchmark().column;
    if column != default_column {
        if let Some(v) = num(row.get(default_column)) {
            fallbacks.push(Fallback::Benchmark);
            return (Some(v), default_column);
        }
    }
    (None, column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtrack_core::ViewState;
    use serde_json::json;

    fn opts(standard: &str, benchmark: &str) -> ResolvedOptions {
        crate::options::resolve_options(&ViewState { standard: standard.into(), benchmark: benchmark.into(), ..ViewState::default() })
    }

    fn tables() -> ScoreTables {
        let esr = table::esr_scores(&json!([
            {"country_code": "USA", "metric_code": "esr", "year": 2018, "standard": "Core", "score_adjusted": 80.5, "score_best": 70.1},
            {"country_code": "USA", "metric_code": "esr", "year": 2018, "standard": "HiOECD", "score_adjusted": 75.0},
            {"country_code": "USA", "metric_code": "food", "year": 2018, "standard": "Core", "score_adjusted": 104.2},
            {"country_code": "USA", "metric_code": "food", "year": 2017, "standard": "Core", "score_adjusted": 50.0}
        ]));
        ScoreTables { esr_year: table::latest_year(&esr, |r| r.year), esr, ..ScoreTables::default() }
    }

    #[test]
    fn benchmark_column_selected() {
        let s = tables().esr("USA", "esr", &opts("core", "best")).unwrap();
        assert_eq!(s.value, Some(70.1));
        assert_eq!(s.column, "score_best");
        assert!(!s.has_fallback());
    }

    #[test]
    fn missing_benchmark_column_falls_back() {
        let s = tables().esr("USA", "esr", &opts("hi", "best")).unwrap();
        assert_eq!(s.value, Some(75.0));
        assert_eq!(s.column, "score_adjusted");
        assert_eq!(s.fallbacks.as_slice(), &[Fallback::Benchmark]);
    }

    #[test]
    fn missing_standard_row_falls_back_to_core() {
        let s = tables().esr("USA", "food", &opts("hi", "adjusted")).unwrap();
        assert_eq!(s.fallbacks.as_slice(), &[Fallback::Standard]);
        assert_eq!(s.year, 2018);
    }

    #[test]
    fn display_is_clamped_and_flagged() {
        let s = tables().esr("USA", "food", &opts("core", "adjusted")).unwrap();
        assert_eq!(s.value, Some(104.2));
        assert_eq!(s.display, Some(100.0));
        assert!(s.out_of_range);
    }

    #[test]
    fn unknown_country_yields_nothing() {
        assert!(tables().esr("CAN", "esr", &opts("core", "adjusted")).is_none());
    }
}
