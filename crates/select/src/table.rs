//! Typed rows parsed from raw dataset payloads.
//!
//! Payloads are arrays of objects. Numbers may be JSON numbers or strings
//! (CSV origin); empty strings and `NA` are missing. Rows naming a metric the
//! taxonomy does not know are dropped, with one warning per parse.

use rtrack_core::taxonomy::{self, quasi_equals, Dimension, IncomeGroup};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

pub const COL_COUNTRY: &str = "country_code";
pub const COL_METRIC: &str = "metric_code";
pub const COL_YEAR: &str = "year";
pub const COL_STANDARD: &str = "standard";
pub const COL_REGION: &str = "region_code";
pub const COL_SUBREGION: &str = "subregion_code";
pub const COL_HIGH_INCOME: &str = "high_income_country";
pub const COL_OECD: &str = "OECD_country";
pub const COL_GROUP: &str = "group_code";
pub const COL_COUNT: &str = "count";

/// Number from a JSON number or numeric string.
pub fn num(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("na") { None } else { s.parse::<f64>().ok().filter(|f| f.is_finite()) }
        }
        _ => None,
    }
}

fn text(row: &Map<String, Value>, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn year(row: &Map<String, Value>) -> Option<i32> { num(row.get(COL_YEAR)).map(|y| y as i32) }

fn rows(payload: &Value) -> impl Iterator<Item = &Map<String, Value>> {
    payload.as_array().into_iter().flatten().filter_map(|r| r.as_object())
}

fn report_dropped(table: &'static str, dropped: usize, sample: Option<String>) {
    if dropped > 0 {
        warn!(table, dropped, sample = ?sample, "select: rows with unknown metric codes dropped");
        metrics::counter!("selector_rows_dropped_total", dropped as u64, "table" => table);
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Country {
    pub code: String,
    pub region: Option<String>,
    pub subregion: Option<String>,
    pub high_income: Value,
    pub oecd: bool,
    /// Every column as delivered.
    pub attrs: Map<String, Value>,
}

impl Country {
    pub fn income_group(&self) -> Option<&'static IncomeGroup> { taxonomy::income_group_for(&self.high_income) }
}

pub fn countries(payload: &Value) -> Vec<Country> {
    rows(payload)
        .filter_map(|r| {
            Some(Country {
                code: text(r, COL_COUNTRY)?.to_ascii_uppercase(),
                region: text(r, COL_REGION),
                subregion: text(r, COL_SUBREGION),
                high_income: r.get(COL_HIGH_INCOME).cloned().unwrap_or(Value::Null),
                oecd: r.get(COL_OECD).map(|v| quasi_equals(v, "1")).unwrap_or(false),
                attrs: r.clone(),
            })
        })
        .collect()
}

/// Row of a per-country table keyed by `country_code`, kept opaque (grammar, metadata).
pub fn keyed_row<'a>(payload: &'a Value, key_col: &str, key: &str) -> Option<&'a Map<String, Value>> {
    rows(payload).find(|r| text(r, key_col).map(|c| c.eq_ignore_ascii_case(key)).unwrap_or(false))
}

/// ESR dimension or right score row.
#[derive(Debug, Clone, PartialEq)]
pub struct EsrScore {
    pub country: String,
    pub metric: &'static str,
    pub year: i32,
    pub standard: String,
    pub row: Map<String, Value>,
}

pub fn esr_scores(payload: &Value) -> Vec<EsrScore> {
    let mut dropped = 0usize;
    let mut sample = None;
    let out = rows(payload)
        .filter_map(|r| {
            let code = text(r, COL_METRIC)?;
            let metric = match Dimension::from_code(&code) {
                Some(Dimension::Esr) => Dimension::Esr.code(),
                _ => match taxonomy::right_for(&code).filter(|s| s.dimension == Dimension::Esr) {
                    Some(spec) => spec.code,
                    None => {
                        dropped += 1;
                        sample.get_or_insert(code);
                        return None;
                    }
                },
            };
            Some(EsrScore {
                country: text(r, COL_COUNTRY)?.to_ascii_uppercase(),
                metric,
                year: year(r)?,
                standard: text(r, COL_STANDARD).unwrap_or_default(),
                row: r.clone(),
            })
        })
        .collect();
    report_dropped("esrScores", dropped, sample);
    out
}

/// ESR indicator score row; standard applicability comes from the taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorScore {
    pub country: String,
    pub indicator: &'static taxonomy::IndicatorSpec,
    pub year: i32,
    pub row: Map<String, Value>,
}

pub fn indicator_scores(payload: &Value) -> Vec<IndicatorScore> {
    let mut dropped = 0usize;
    let mut sample = None;
    let out = rows(payload)
        .filter_map(|r| {
            let code = text(r, COL_METRIC)?;
            let Some(indicator) = taxonomy::indicator_for(&code) else {
                dropped += 1;
                sample.get_or_insert(code);
                return None;
            };
            Some(IndicatorScore { country: text(r, COL_COUNTRY)?.to_ascii_uppercase(), indicator, year: year(r)?, row: r.clone() })
        })
        .collect();
    report_dropped("esrIndicatorScores", dropped, sample);
    out
}

/// CPR dimension or right score row.
#[derive(Debug, Clone, PartialEq)]
pub struct CprScore {
    pub country: String,
    pub metric: &'static str,
    pub year: i32,
    pub mean: Option<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

pub fn cpr_scores(payload: &Value) -> Vec<CprScore> {
    let mut dropped = 0usize;
    let mut sample = None;
    let out = rows(payload)
        .filter_map(|r| {
            let code = text(r, COL_METRIC)?;
            let metric = match taxonomy::metric_for(&code) {
                Some(m) if m.dimension().family() == taxonomy::Family::Cpr => m.code(),
                _ => {
                    dropped += 1;
                    sample.get_or_insert(code);
                    return None;
                }
            };
            Some(CprScore {
                country: text(r, COL_COUNTRY)?.to_ascii_uppercase(),
                metric,
                year: year(r)?,
                mean: num(r.get(taxonomy::CPR_MEAN_COLUMN)),
                lower: num(r.get(taxonomy::CPR_LOWER_COLUMN)),
                upper: num(r.get(taxonomy::CPR_UPPER_COLUMN)),
            })
        })
        .collect();
    report_dropped("cprScores", dropped, sample);
    out
}

/// One auxiliary indicator row (population, GDP, ...); all non-key columns are metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxRow {
    pub country: String,
    pub year: i32,
    pub row: Map<String, Value>,
}

pub fn aux_rows(payload: &Value) -> Vec<AuxRow> {
    rows(payload)
        .filter_map(|r| Some(AuxRow { country: text(r, COL_COUNTRY)?.to_ascii_uppercase(), year: year(r)?, row: r.clone() }))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtRiskRow {
    pub country: String,
    pub right: &'static str,
    pub group: String,
    pub count: f64,
}

pub fn at_risk(payload: &Value) -> Vec<AtRiskRow> {
    let mut dropped = 0usize;
    let mut sample = None;
    let out = rows(payload)
        .filter_map(|r| {
            let code = text(r, COL_METRIC)?;
            let Some(spec) = taxonomy::right_for(&code) else {
                dropped += 1;
                sample.get_or_insert(code);
                return None;
            };
            Some(AtRiskRow {
                country: text(r, COL_COUNTRY)?.to_ascii_uppercase(),
                right: spec.code,
                group: text(r, COL_GROUP)?,
                count: num(r.get(COL_COUNT)).unwrap_or(0.0),
            })
        })
        .collect();
    report_dropped("atRisk", dropped, sample);
    out
}

/// Latest year present in a set of rows.
pub fn latest_year<T>(rows: &[T], year: impl Fn(&T) -> i32) -> Option<i32> { rows.iter().map(year).max() }

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_from_strings() {
        assert_eq!(num(Some(&json!("7.5"))), Some(7.5));
        assert_eq!(num(Some(&json!(3))), Some(3.0));
        assert_eq!(num(Some(&json!(""))), None);
        assert_eq!(num(Some(&json!("NA"))), None);
        assert_eq!(num(None), None);
    }

    #[test]
    fn unknown_metrics_are_dropped() {
        let v = json!([
            {"country_code": "usa", "metric_code": "food", "year": "2018", "standard": "Core"},
            {"country_code": "USA", "metric_code": "happiness", "year": 2018, "standard": "Core"},
            {"country_code": "USA", "metric_code": "torture", "year": 2018, "standard": "Core"}
        ]);
        let rows = esr_scores(&v);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].country, "USA");
        assert_eq!(rows[0].year, 2018);
    }

    #[test]
    fn cpr_accepts_dimensions_and_rights() {
        let v = json!([
            {"country_code": "USA", "metric_code": "physint", "year": 2018, "mean": "6.1", "lower": 5.0, "upper": 7.2},
            {"country_code": "USA", "metric_code": "assembly", "year": 2018, "mean": 8},
            {"country_code": "USA", "metric_code": "food", "year": 2018, "mean": 8}
        ]);
        let rows = cpr_scores(&v);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].mean, Some(6.1));
        assert_eq!(rows[1].upper, None);
    }
}
