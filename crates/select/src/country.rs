use std::collections::BTreeSet;
use std::sync::Arc;

use rtrack_core::taxonomy::{self, Dimension, IncomeGroup, Metric, ScaleKind, RIGHTS};
use rtrack_core::{
    ViewError, ViewState, AT_RISK, AUX_INDICATORS, COUNTRIES, COUNTRIES_GRAMMAR, COUNTRY_DEPENDENCIES, ESR_INDICATORS,
};
use rtrack_store::StoreSnapshot;
use serde::Serialize;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::cache::{DimensionAverage, SelectorCache};
use crate::options::{resolve_options, ResolvedOptions};
use crate::score::{Score, ScoreTables};
use crate::table::{self, num, Country, COL_COUNTRY, COL_METRIC};
use crate::Selected;

/// Aux column holding GDP per capita in current US$.
pub const AUX_GDP_CURRENT: &str = "GDP_current_US";
/// Aux column holding GDP per capita in 2011 PPP$.
pub const AUX_GDP_PPP: &str = "GDP_2011_PPP";
pub const AUX_POPULATION: &str = "population";
pub const AUX_METRICS: &[&str] = &[AUX_POPULATION, AUX_GDP_CURRENT, AUX_GDP_PPP];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AtRiskGroup {
    pub group: String,
    pub count: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RightAtRisk {
    pub right: &'static str,
    pub dimension: Dimension,
    pub groups: SmallVec<[AtRiskGroup; 4]>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuxFact {
    pub metric: &'static str,
    pub value: f64,
    pub year: i32,
}

/// Everything a country report renders, derived from the store and the URL.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CountryViewModel {
    /// None only when the countries table itself failed to load.
    pub country: Option<Country>,
    pub grammar: Option<Map<String, Value>>,
    pub income_group: Option<&'static str>,
    pub options: ResolvedOptions,
    pub dimensions: Vec<Score>,
    pub rights: Vec<Score>,
    pub indicators: Vec<Score>,
    /// Scale-selected headline scores.
    pub summary: Vec<Score>,
    pub dimension_averages: Arc<Vec<DimensionAverage>>,
    pub at_risk: Vec<RightAtRisk>,
    pub aux_facts: Vec<AuxFact>,
    pub current_gdp: Option<AuxFact>,
    pub ppp_gdp: Option<AuxFact>,
    pub esr_year: Option<i32>,
    pub cpr_year: Option<i32>,
    /// Indicator metadata rows for the indicators shown.
    pub indicator_meta: Vec<Map<String, Value>>,
    /// Datasets that failed; their fields are empty.
    pub degraded: Vec<String>,
}

pub fn select_dimensions(tables: &ScoreTables, code: &str, opts: &ResolvedOptions) -> Vec<Score> {
    Dimension::ALL.into_iter().filter_map(|d| tables.metric(code, Metric::Dimension(d), opts)).collect()
}

pub fn select_rights(tables: &ScoreTables, code: &str, opts: &ResolvedOptions) -> Vec<Score> {
    RIGHTS.iter().filter_map(|r| tables.metric(code, Metric::Right(r), opts)).collect()
}

/// Indicators that apply to the resolved standard.
pub fn select_indicators(tables: &ScoreTables, code: &str, opts: &ResolvedOptions) -> Vec<Score> {
    let standard = opts.standard_spec();
    taxonomy::INDICATORS
        .iter()
        .filter(|i| i.scope.applies_to(standard))
        .filter_map(|i| tables.indicator(code, i, opts))
        .collect()
}

pub fn select_summary(dimensions: &[Score], rights: &[Score], opts: &ResolvedOptions) -> Vec<Score> {
    match opts.scale_spec().kind {
        ScaleKind::Dimensions => dimensions.to_vec(),
        ScaleKind::Rights => rights.to_vec(),
    }
}

/// At-risk groups per right, in taxonomy order; groups by count desc then code.
pub fn select_at_risk(payload: &Value, code: &str) -> Vec<RightAtRisk> {
    let rows = table::at_risk(payload);
    RIGHTS
        .iter()
        .filter_map(|spec| {
            let mut groups: SmallVec<[AtRiskGroup; 4]> = rows
                .iter()
                .filter(|r| r.country == code && r.right == spec.code)
                .map(|r| AtRiskGroup { group: r.group.clone(), count: r.count })
                .collect();
            if groups.is_empty() {
                return None;
            }
            groups.sort_by(|a, b| b.count.total_cmp(&a.count).then_with(|| a.group.cmp(&b.group)));
            Some(RightAtRisk { right: spec.code, dimension: spec.dimension, groups })
        })
        .collect()
}

/// Latest non-missing value per aux metric.
pub fn select_aux_facts(payload: &Value, code: &str) -> Vec<AuxFact> {
    let mut rows = table::aux_rows(payload);
    rows.retain(|r| r.country == code);
    rows.sort_by(|a, b| b.year.cmp(&a.year));
    AUX_METRICS
        .iter()
        .filter_map(|&metric| {
            rows.iter().find_map(|r| num(r.row.get(metric)).map(|value| AuxFact { metric, value, year: r.year }))
        })
        .collect()
}

pub fn select_income_group(country: &Country) -> Option<&'static IncomeGroup> { country.income_group() }

fn indicator_meta(payload: &Value, indicators: &[Score]) -> Vec<Map<String, Value>> {
    indicators.iter().filter_map(|s| table::keyed_row(payload, COL_METRIC, s.metric).cloned()).collect()
}

/// Build the country report model. Not ready until every declared dependency settles.
pub fn country_view_model(
    snap: &StoreSnapshot,
    view: &ViewState,
    code: &str,
    cache: &SelectorCache,
) -> Selected<CountryViewModel> {
    let readiness = snap.readiness(COUNTRY_DEPENDENCIES);
    if !readiness.pending.is_empty() {
        debug!(error = %ViewError::DataUnavailable(readiness.pending.join(",")), "select: country dependencies pending");
        return Selected::NotReady { pending: readiness.pending };
    }
    let code = code.to_ascii_uppercase();
    let failed: BTreeSet<&str> = readiness.failed.iter().map(|s| s.as_str()).collect();
    for name in failed.iter() {
        let reason = snap.get(name).and_then(|e| e.error.clone()).unwrap_or_default();
        let err = ViewError::DataLoadFailed { dataset: name.to_string(), reason };
        debug!(error = %err, "select: degrading country view");
    }

    let country = match snap.payload(COUNTRIES) {
        Some(p) => match table::countries(p).into_iter().find(|c| c.code == code) {
            Some(c) => Some(c),
            None => {
                warn!(error = %ViewError::UnknownEntityKey(code.clone()), "select: country not found");
                return Selected::Absent;
            }
        },
        None => None,
    };

    let options = resolve_options(view);
    let tables = cache.score_tables(snap);
    let dimensions = select_dimensions(&tables, &code, &options);
    let rights = select_rights(&tables, &code, &options);
    let indicators = select_indicators(&tables, &code, &options);
    let summary = select_summary(&dimensions, &rights, &options);
    let dimension_averages = cache.dimension_averages(snap, &tables, &options);
    let aux_facts = snap.payload(AUX_INDICATORS).map(|p| select_aux_facts(p, &code)).unwrap_or_default();
    let fact = |m: &str| aux_facts.iter().find(|f| f.metric == m).cloned();

    Selected::Ready(CountryViewModel {
        grammar: snap.payload(COUNTRIES_GRAMMAR).and_then(|p| table::keyed_row(p, COL_COUNTRY, &code)).cloned(),
        income_group: country.as_ref().and_then(select_income_group).map(|g| g.key),
        country,
        at_risk: snap.payload(AT_RISK).map(|p| select_at_risk(p, &code)).unwrap_or_default(),
        current_gdp: fact(AUX_GDP_CURRENT),
        ppp_gdp: fact(AUX_GDP_PPP),
        indicator_meta: snap.payload(ESR_INDICATORS).map(|p| indicator_meta(p, &indicators)).unwrap_or_default(),
        esr_year: tables.esr_year,
        cpr_year: tables.cpr_year,
        aux_facts: aux_facts.clone(),
        options,
        dimensions,
        rights,
        indicators,
        summary,
        dimension_averages,
        degraded: failed.into_iter().map(str::to_string).collect(),
    })
}
