#![forbid(unsafe_code)]

use rtrack_core::{
    AT_RISK, AUX_INDICATORS, COUNTRIES, COUNTRIES_GRAMMAR, CPR_SCORES, ESR_INDICATORS, ESR_INDICATOR_SCORES, ESR_SCORES,
};
use rtrack_query::decode;
use rtrack_select::{
    country_view_model, filter_countries, metric_view_model, Fallback, Selected, SelectorCache,
};
use rtrack_store::DatasetStore;
use serde_json::json;

fn seeded() -> DatasetStore { seeded_except(&[]) }

/// Every country dependency Ready, except `skip`.
fn seeded_except(skip: &[&str]) -> DatasetStore {
    let s = Seeder { store: DatasetStore::new(), skip };
    s.put_ready(
        COUNTRIES,
        json!([
            {"country_code": "USA", "region_code": "americas", "subregion_code": "north-america", "high_income_country": "1", "OECD_country": 1},
            {"country_code": "CAN", "region_code": "americas", "subregion_code": "north-america", "high_income_country": 1, "OECD_country": "1"},
            {"country_code": "MEX", "region_code": "americas", "subregion_code": "central-america", "high_income_country": "0", "OECD_country": "1"},
            {"country_code": "KEN", "region_code": "sub-saharan-africa", "high_income_country": 0, "OECD_country": 0}
        ]),
    );
    s.put_ready(COUNTRIES_GRAMMAR, json!([{"country_code": "USA", "definite_article": "the"}]));
    s.put_ready(
        ESR_INDICATORS,
        json!([
            {"metric_code": "primary-enrollment", "raw_unit": "%"},
            {"metric_code": "pisa-score", "raw_unit": "points"}
        ]),
    );
    s.put_ready(
        ESR_SCORES,
        json!([
            {"country_code": "USA", "metric_code": "esr", "year": "2018", "standard": "Core", "score_adjusted": "80.5", "score_best": "70.1"},
            {"country_code": "USA", "metric_code": "esr", "year": "2018", "standard": "HiOECD", "score_adjusted": "75.0", "score_best": "65.0"},
            {"country_code": "USA", "metric_code": "food", "year": "2018", "standard": "Core", "score_adjusted": "95.0", "score_best": ""},
            {"country_code": "CAN", "metric_code": "esr", "year": "2018", "standard": "Core", "score_adjusted": "90.5", "score_best": "85.0"},
            {"country_code": "MEX", "metric_code": "esr", "year": "2018", "standard": "Core", "score_adjusted": "70.0", "score_best": "60.0"},
            {"country_code": "USA", "metric_code": "esr", "year": "2016", "standard": "Core", "score_adjusted": "10.0"},
            {"country_code": "USA", "metric_code": "wellbeing", "year": "2018", "standard": "Core", "score_adjusted": "50"}
        ]),
    );
    s.put_ready(
        ESR_INDICATOR_SCORES,
        json!([
            {"country_code": "USA", "metric_code": "primary-enrollment", "year": 2018, "value": 91.2, "score_adjusted": 96.0, "score_best": 82.5},
            {"country_code": "USA", "metric_code": "pisa-score", "year": 2018, "value": 495, "score_adjusted": 88.0}
        ]),
    );
    s.put_ready(
        CPR_SCORES,
        json!([
            {"country_code": "USA", "metric_code": "physint", "year": 2019, "mean": 6.4, "lower": 5.9, "upper": 6.9},
            {"country_code": "USA", "metric_code": "empowerment", "year": 2019, "mean": 7.2},
            {"country_code": "USA", "metric_code": "torture", "year": 2019, "mean": 10.4}
        ]),
    );
    s.put_ready(
        AUX_INDICATORS,
        json!([
            {"country_code": "USA", "year": 2017, "population": 325000000, "GDP_current_US": 59900, "GDP_2011_PPP": 54200},
            {"country_code": "USA", "year": 2018, "population": 327000000, "GDP_current_US": "", "GDP_2011_PPP": 55300}
        ]),
    );
    s.put_ready(
        AT_RISK,
        json!([
            {"country_code": "USA", "metric_code": "food", "group_code": "poor", "count": 12},
            {"country_code": "USA", "metric_code": "food", "group_code": "children", "count": 30},
            {"country_code": "USA", "metric_code": "food", "group_code": "elderly", "count": 12},
            {"country_code": "USA", "metric_code": "arrest", "group_code": "migrants", "count": "5"}
        ]),
    );
    s.store
}

struct Seeder<'a> {
    store: DatasetStore,
    skip: &'a [&'a str],
}

impl Seeder<'_> {
    fn put_ready(&self, name: &str, payload: serde_json::Value) {
        if !self.skip.iter().any(|s| *s == name) {
            self.store.put_ready(name, payload);
        }
    }
}

#[test]
fn not_ready_until_every_dependency_settles() {
    let s = DatasetStore::new();
    s.put_ready(COUNTRIES, json!([{"country_code": "USA"}]));
    s.begin_load(&[AT_RISK], false);
    let cache = SelectorCache::new();
    match country_view_model(&s.current(), &decode(""), "USA", &cache) {
        Selected::NotReady { pending } => {
            assert!(pending.contains(&AT_RISK.to_string()));
            assert!(pending.contains(&ESR_SCORES.to_string()));
        }
        other => panic!("expected NotReady, got {:?}", other),
    }
}

#[test]
fn benchmark_best_for_usa() {
    let s = seeded();
    let cache = SelectorCache::new();
    let vm = country_view_model(&s.current(), &decode("?scale=abs&benchmark=best"), "usa", &cache).ready().unwrap();

    assert_eq!(vm.options.scale, "d");
    assert_eq!(vm.options.benchmark, "best");
    assert_eq!(vm.options.substitutions.len(), 1);

    let esr = vm.dimensions.iter().find(|d| d.metric == "esr").unwrap();
    assert_eq!(esr.value, Some(70.1));
    assert_eq!(esr.column, "score_best");
    assert_eq!(esr.year, 2018);

    let food = vm.rights.iter().find(|r| r.metric == "food").unwrap();
    assert_eq!(food.value, Some(95.0));
    assert_eq!(food.fallbacks.as_slice(), &[Fallback::Benchmark]);

    assert_eq!(vm.indicators.len(), 1);
    let enrolment = &vm.indicators[0];
    assert_eq!(enrolment.metric, "primary-enrollment");
    assert_eq!(enrolment.column, "score_best");
    assert_eq!(enrolment.value, Some(82.5));
    assert!(!enrolment.has_fallback());

    assert_eq!(vm.summary.len(), 3);
    assert_eq!(vm.esr_year, Some(2018));
    assert_eq!(vm.cpr_year, Some(2019));
}

#[test]
fn indicator_without_best_column_falls_back_to_adjusted() {
    let s = seeded();
    let cache = SelectorCache::new();
    let vm = country_view_model(&s.current(), &decode("standard=hi&benchmark=best"), "USA", &cache).ready().unwrap();
    let pisa = vm.indicators.iter().find(|i| i.metric == "pisa-score").unwrap();
    assert_eq!(pisa.column, "score_adjusted");
    assert_eq!(pisa.value, Some(88.0));
    assert_eq!(pisa.fallbacks.as_slice(), &[Fallback::Benchmark]);
}

#[test]
fn hi_standard_and_raw_indicators() {
    let s = seeded();
    let cache = SelectorCache::new();
    let vm = country_view_model(&s.current(), &decode("standard=hi&raw=1&scale=r"), "USA", &cache).ready().unwrap();

    let esr = vm.dimensions.iter().find(|d| d.metric == "esr").unwrap();
    assert_eq!(esr.value, Some(75.0));

    let codes: Vec<&str> = vm.indicators.iter().map(|i| i.metric).collect();
    assert_eq!(codes, vec!["pisa-score"]);
    assert_eq!(vm.indicators[0].value, Some(495.0));
    assert_eq!(vm.indicators[0].column, "value");
    assert!(!vm.indicators[0].out_of_range);
    assert_eq!(vm.indicator_meta.len(), 1);

    assert_eq!(vm.summary.iter().map(|s| s.metric).collect::<Vec<_>>(), vec!["food", "torture"]);
}

#[test]
fn cpr_band_and_clamp() {
    let s = seeded();
    let vm = country_view_model(&s.current(), &decode(""), "USA", &SelectorCache::new()).ready().unwrap();
    let physint = vm.dimensions.iter().find(|d| d.metric == "physint").unwrap();
    assert_eq!(physint.band, Some((5.9, 6.9)));
    let torture = vm.rights.iter().find(|r| r.metric == "torture").unwrap();
    assert_eq!(torture.display, Some(10.0));
    assert!(torture.out_of_range);
}

#[test]
fn country_facts() {
    let s = seeded();
    let vm = country_view_model(&s.current(), &decode(""), "USA", &SelectorCache::new()).ready().unwrap();
    assert_eq!(vm.income_group, Some("hi"));
    assert_eq!(vm.grammar.as_ref().and_then(|g| g.get("definite_article")), Some(&json!("the")));
    assert_eq!(vm.current_gdp.as_ref().map(|f| (f.value, f.year)), Some((59900.0, 2017)));
    assert_eq!(vm.ppp_gdp.as_ref().map(|f| (f.value, f.year)), Some((55300.0, 2018)));

    assert_eq!(vm.at_risk.len(), 2);
    assert_eq!(vm.at_risk[0].right, "food");
    let groups: Vec<&str> = vm.at_risk[0].groups.iter().map(|g| g.group.as_str()).collect();
    assert_eq!(groups, vec!["children", "elderly", "poor"]);
    assert_eq!(vm.at_risk[1].right, "arrest");

    let esr_avg = vm.dimension_averages.iter().find(|a| a.dimension.code() == "esr").unwrap();
    assert_eq!(esr_avg.countries, 3);
    assert_eq!(esr_avg.value, Some((80.5 + 90.5 + 70.0) / 3.0));
}

#[test]
fn unknown_country_is_absent() {
    let s = seeded();
    assert_eq!(country_view_model(&s.current(), &decode(""), "ZZZ", &SelectorCache::new()), Selected::Absent);
}

#[test]
fn failed_dataset_degrades() {
    let s = seeded_except(&[AT_RISK]);
    let (_, id) = s.begin_load(&[AT_RISK], false).remove(0);
    s.complete(AT_RISK, id, Err("HTTP 500".into()));

    let vm = country_view_model(&s.current(), &decode(""), "USA", &SelectorCache::new()).ready().unwrap();
    assert_eq!(vm.degraded, vec![AT_RISK.to_string()]);
    assert!(vm.at_risk.is_empty());
    assert!(!vm.dimensions.is_empty());
}

#[test]
fn metric_ranking_respects_filters() {
    let s = seeded();
    let vm = metric_view_model(&s.current(), &decode("benchmark=best"), "esr").ready().unwrap();
    let order: Vec<(&str, usize)> = vm.ranking.iter().map(|r| (r.country.as_str(), r.rank)).collect();
    assert_eq!(order, vec![("CAN", 1), ("USA", 2), ("MEX", 3)]);

    let vm = metric_view_model(&s.current(), &decode("income=hi"), "esr").ready().unwrap();
    assert_eq!(vm.ranking.iter().map(|r| r.country.as_str()).collect::<Vec<_>>(), vec!["CAN", "USA"]);

    assert_eq!(metric_view_model(&s.current(), &decode(""), "wellbeing"), Selected::Absent);
}

#[test]
fn country_list_filters() {
    let s = seeded();
    let codes = |q: &str| -> Vec<String> {
        filter_countries(&s.current(), &decode(q)).ready().unwrap().into_iter().map(|c| c.code).collect()
    };
    assert_eq!(codes(""), vec!["CAN", "KEN", "MEX", "USA"]);
    assert_eq!(codes("subregion=north-america"), vec!["CAN", "USA"]);
    assert_eq!(codes("income=lmi&oecd=1"), vec!["MEX"]);
    assert_eq!(codes("region=sub-saharan-africa&utm_source=x"), vec!["KEN"]);
}
