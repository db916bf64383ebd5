//! Closed taxonomy of measured rights.
//!
//! This module provides:
//! - Dimensions, rights and ESR indicators with stable codes
//! - Display options (scales, standards, benchmarks) and their columns
//! - Income groups and the loose equality used to match them against raw data
//!
//! Score tables are validated against these tables when parsed; codes that are
//! not listed here never reach a view model.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Top-level category of measured rights.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Esr,
    Physint,
    Empowerment,
}

/// Measurement family; decides which score table and display range apply.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Family {
    /// Economic and social rights, scored 0..100 against a benchmark.
    Esr,
    /// Civil and political rights, survey-based 0..10 with an uncertainty band.
    Cpr,
}

impl Family {
    /// Displayable range for bar-style visualizations.
    pub fn display_range(self) -> (f64, f64) {
        match self {
            Family::Esr => (0.0, 100.0),
            Family::Cpr => (0.0, 10.0),
        }
    }
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Esr, Dimension::Physint, Dimension::Empowerment];

    pub fn code(self) -> &'static str {
        match self {
            Dimension::Esr => "esr",
            Dimension::Physint => "physint",
            Dimension::Empowerment => "empowerment",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Dimension::Esr => "Quality of life",
            Dimension::Physint => "Safety from the state",
            Dimension::Empowerment => "Empowerment",
        }
    }

    pub fn family(self) -> Family {
        match self {
            Dimension::Esr => Family::Esr,
            Dimension::Physint | Dimension::Empowerment => Family::Cpr,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.code() == code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RightSpec {
    pub code: &'static str,
    pub dimension: Dimension,
    pub label: &'static str,
}

/// Which assessment standard an ESR indicator belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StandardScope {
    Core,
    HiOecd,
    Both,
}

impl StandardScope {
    pub fn applies_to(self, standard: &StandardSpec) -> bool {
        match self {
            StandardScope::Both => true,
            StandardScope::Core => standard.key == "core",
            StandardScope::HiOecd => standard.key == "hi",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorSpec {
    pub code: &'static str,
    pub right: &'static str,
    pub scope: StandardScope,
    pub label: &'static str,
}

const fn right(code: &'static str, dimension: Dimension, label: &'static str) -> RightSpec {
    RightSpec { code, dimension, label }
}

const fn ind(code: &'static str, right: &'static str, scope: StandardScope, label: &'static str) -> IndicatorSpec {
    IndicatorSpec { code, right, scope, label }
}

// ---------------- Rights (ordered) ----------------
pub const RIGHTS: &[RightSpec] = &[
    right("education", Dimension::Esr, "Right to education"),
    right("food", Dimension::Esr, "Right to food"),
    right("health", Dimension::Esr, "Right to health"),
    right("housing", Dimension::Esr, "Right to housing"),
    right("work", Dimension::Esr, "Right to work"),
    right("arrest", Dimension::Physint, "Freedom from arbitrary arrest"),
    right("disappearance", Dimension::Physint, "Freedom from disappearance"),
    right("death-penalty", Dimension::Physint, "Freedom from the death penalty"),
    right("extrajud-killing", Dimension::Physint, "Freedom from extrajudicial execution"),
    right("torture", Dimension::Physint, "Freedom from torture"),
    right("assembly", Dimension::Empowerment, "Right to assembly and association"),
    right("expression", Dimension::Empowerment, "Right to opinion and expression"),
    right("participation", Dimension::Empowerment, "Right to participate in government"),
];

// ---------------- ESR indicators (ordered) ----------------
pub const INDICATORS: &[IndicatorSpec] = &[
    ind("primary-enrollment", "education", StandardScope::Core, "Net primary school enrolment"),
    ind("secondary-enrollment", "education", StandardScope::Both, "Net secondary school enrolment"),
    ind("pisa-score", "education", StandardScope::HiOecd, "PISA scores"),
    ind("not-stunted", "food", StandardScope::Core, "Children not stunted"),
    ind("food-security", "food", StandardScope::HiOecd, "Food security"),
    ind("contraception", "health", StandardScope::Core, "Access to contraception"),
    ind("child-mortality", "health", StandardScope::Both, "Child survival"),
    ind("adult-survival", "health", StandardScope::Both, "Adult survival"),
    ind("birth-weight", "health", StandardScope::HiOecd, "Healthy birth weight"),
    ind("safe-sanitation", "housing", StandardScope::Core, "Safely managed sanitation"),
    ind("water-in-home", "housing", StandardScope::Core, "Water in the home"),
    ind("affordable-housing", "housing", StandardScope::HiOecd, "Affordable housing"),
    ind("absolute-poverty", "work", StandardScope::Core, "Freedom from absolute poverty"),
    ind("relative-poverty", "work", StandardScope::HiOecd, "Freedom from relative poverty"),
    ind("long-term-unemployment", "work", StandardScope::HiOecd, "Freedom from long-term unemployment"),
];

/// Any metric code resolves to exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Dimension(Dimension),
    Right(&'static RightSpec),
    Indicator(&'static IndicatorSpec),
}

impl Metric {
    pub fn code(&self) -> &'static str {
        match self {
            Metric::Dimension(d) => d.code(),
            Metric::Right(r) => r.code,
            Metric::Indicator(i) => i.code,
        }
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            Metric::Dimension(d) => *d,
            Metric::Right(r) => r.dimension,
            // indicators are ESR-only
            Metric::Indicator(_) => Dimension::Esr,
        }
    }
}

pub fn metric_for(code: &str) -> Option<Metric> {
    if let Some(d) = Dimension::from_code(code) {
        return Some(Metric::Dimension(d));
    }
    if let Some(r) = right_for(code) {
        return Some(Metric::Right(r));
    }
    indicator_for(code).map(Metric::Indicator)
}

pub fn right_for(code: &str) -> Option<&'static RightSpec> { RIGHTS.iter().find(|r| r.code == code) }

pub fn indicator_for(code: &str) -> Option<&'static IndicatorSpec> { INDICATORS.iter().find(|i| i.code == code) }

pub fn rights_for_dimension(d: Dimension) -> impl Iterator<Item = &'static RightSpec> {
    RIGHTS.iter().filter(move |r| r.dimension == d)
}

pub fn indicators_for_right(code: &str) -> Vec<&'static IndicatorSpec> {
    INDICATORS.iter().filter(|i| i.right == code).collect()
}

// ---------------- Display options ----------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScaleKind {
    Dimensions,
    Rights,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleSpec {
    pub key: &'static str,
    pub kind: ScaleKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardSpec {
    pub key: &'static str,
    /// Value found in the `standard` column of ESR score tables.
    pub code: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkSpec {
    pub key: &'static str,
    /// Score column exposed for this benchmark.
    pub column: &'static str,
}

pub const SCALES: &[ScaleSpec] = &[
    ScaleSpec { key: "d", kind: ScaleKind::Dimensions },
    ScaleSpec { key: "r", kind: ScaleKind::Rights },
];

pub const STANDARDS: &[StandardSpec] = &[
    StandardSpec { key: "core", code: "Core" },
    StandardSpec { key: "hi", code: "HiOECD" },
];

pub const BENCHMARKS: &[BenchmarkSpec] = &[
    BenchmarkSpec { key: "adjusted", column: "score_adjusted" },
    BenchmarkSpec { key: "best", column: "score_best" },
];

pub const DEFAULT_SCALE: &str = "d";
pub const DEFAULT_STANDARD: &str = "core";
pub const DEFAULT_BENCHMARK: &str = "adjusted";

/// Raw indicator value column, exposed instead of the benchmark column when `raw` is set.
pub const RAW_COLUMN: &str = "value";
/// CPR columns: mean and uncertainty band.
pub const CPR_MEAN_COLUMN: &str = "mean";
pub const CPR_LOWER_COLUMN: &str = "lower";
pub const CPR_UPPER_COLUMN: &str = "upper";

pub fn scale_for(key: &str) -> Option<&'static ScaleSpec> { SCALES.iter().find(|s| s.key == key) }
pub fn standard_for(key: &str) -> Option<&'static StandardSpec> { STANDARDS.iter().find(|s| s.key == key) }
pub fn benchmark_for(key: &str) -> Option<&'static BenchmarkSpec> { BENCHMARKS.iter().find(|s| s.key == key) }

pub fn default_scale() -> &'static ScaleSpec { &SCALES[0] }
pub fn default_standard() -> &'static StandardSpec { &STANDARDS[0] }
pub fn default_benchmark() -> &'static BenchmarkSpec { &BENCHMARKS[0] }

// ---------------- Income groups ----------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomeGroup {
    pub key: &'static str,
    /// Value of `high_income_country` in the countries table.
    pub value: &'static str,
}

pub const INCOME_GROUPS: &[IncomeGroup] = &[
    IncomeGroup { key: "hi", value: "1" },
    IncomeGroup { key: "lmi", value: "0" },
];

/// Loose equality between a raw JSON scalar and a string: `1 == "1"`, `"1.0" == "1"`.
pub fn quasi_equals(raw: &serde_json::Value, expected: &str) -> bool {
    match raw {
        serde_json::Value::String(s) => {
            s == expected || matches!((s.trim().parse::<f64>(), expected.parse::<f64>()), (Ok(a), Ok(b)) if a == b)
        }
        serde_json::Value::Number(n) => matches!((n.as_f64(), expected.parse::<f64>()), (Some(a), Ok(b)) if a == b),
        serde_json::Value::Bool(b) => (*b && expected == "1") || (!*b && expected == "0"),
        _ => false,
    }
}

pub fn income_group_for(raw: &serde_json::Value) -> Option<&'static IncomeGroup> {
    INCOME_GROUPS.iter().find(|g| quasi_equals(raw, g.value))
}

pub fn income_group_by_key(key: &str) -> Option<&'static IncomeGroup> { INCOME_GROUPS.iter().find(|g| g.key == key) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_indicator_points_at_an_esr_right() {
        for i in INDICATORS {
            let r = right_for(i.right).expect("indicator right must exist");
            assert_eq!(r.dimension, Dimension::Esr, "{} belongs to a non-ESR right", i.code);
        }
    }

    #[test]
    fn metric_codes_are_unique() {
        let mut codes: Vec<&str> = Dimension::ALL.iter().map(|d| d.code()).collect();
        codes.extend(RIGHTS.iter().map(|r| r.code));
        codes.extend(INDICATORS.iter().map(|i| i.code));
        let n = codes.len();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), n);
    }

    #[test]
    fn metric_lookup_resolves_dimension() {
        assert_eq!(metric_for("food").map(|m| m.dimension()), Some(Dimension::Esr));
        assert_eq!(metric_for("torture").map(|m| m.dimension()), Some(Dimension::Physint));
        assert_eq!(metric_for("not-stunted").map(|m| m.dimension()), Some(Dimension::Esr));
        assert!(metric_for("nope").is_none());
    }

    #[test]
    fn quasi_equals_is_loose() {
        assert!(quasi_equals(&serde_json::json!(1), "1"));
        assert!(quasi_equals(&serde_json::json!("1"), "1"));
        assert!(quasi_equals(&serde_json::json!("1.0"), "1"));
        assert!(!quasi_equals(&serde_json::json!("0"), "1"));
        assert_eq!(income_group_for(&serde_json::json!(0)).map(|g| g.key), Some("lmi"));
    }

    #[test]
    fn scope_applies_to_standard() {
        let hi = standard_for("hi").expect("hi");
        assert!(StandardScope::Both.applies_to(hi));
        assert!(StandardScope::HiOecd.applies_to(hi));
        assert!(!StandardScope::Core.applies_to(hi));
    }
}
