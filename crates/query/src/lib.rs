//! rtrack query codec: ViewState <-> query string.
//!
//! Decoding is total: anything absent or malformed falls back to the schema
//! defaults. Encoding is relative to the previous state so that foreign keys and
//! untouched parameters carry over, and it is deterministic (keys sorted).

#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use rtrack_core::{
    is_filter_key, is_schema_key, Params, TabRef, ViewError, ViewState, PARAM_BENCHMARK, PARAM_RAW, PARAM_SCALE,
    PARAM_STANDARD, PARAM_TAB,
};
use tracing::debug;
use url::form_urlencoded;

mod location;

pub use location::Location;

static OPTION_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_-]{0,31}$").expect("option token regex"));

/// Decode a query string (leading `?` optional) into a ViewState.
pub fn decode(query: &str) -> ViewState { overlay(ViewState::default(), query) }

/// Overlay the parameters explicitly present in `query` onto `view`.
///
/// Schema keys take their first occurrence. A foreign key present in `query`
/// replaces all previous values with every value it carries, in order.
pub fn overlay(mut view: ViewState, query: &str) -> ViewState {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    for (key, value) in parse_pairs(query) {
        let first = seen.insert(key.clone());
        if is_schema_key(&key) {
            if first { apply_pair(&mut view, key, value); }
        } else {
            let values = view.extra.entry(key).or_default();
            if first { values.clear(); }
            values.push(value);
        }
    }
    view
}

/// Keys explicitly present in `query`, malformed or not.
pub fn present_keys(query: &str) -> BTreeSet<String> { parse_pairs(query).into_iter().map(|(k, _)| k).collect() }

/// Encode `next` relative to `previous`:
/// previous params, minus `delete`, plus every key whose value changed.
pub fn encode(next: &ViewState, previous: &ViewState, delete: &BTreeSet<String>) -> String {
    let prev = previous.params();
    let nxt = next.params();
    let mut out = prev.clone();
    for k in delete.iter() {
        out.remove(k);
    }
    for (k, v) in nxt.iter() {
        if prev.get(k) != Some(v) {
            out.insert(k.clone(), v.clone());
        }
    }
    for k in prev.keys() {
        if !nxt.contains_key(k) {
            out.remove(k);
        }
    }
    serialize(&out)
}

/// Serialize params in stable key order, without a leading `?`. Repeated values keep their order.
pub fn serialize(params: &Params) -> String {
    let mut ser = form_urlencoded::Serializer::new(String::new());
    for (k, vs) in params.iter() {
        for v in vs.iter() {
            ser.append_pair(k, v);
        }
    }
    ser.finish()
}

fn parse_pairs(query: &str) -> Vec<(String, String)> {
    let q = query.strip_prefix('?').unwrap_or(query);
    form_urlencoded::parse(q.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

fn apply_pair(view: &mut ViewState, key: String, value: String) {
    match key.as_str() {
        PARAM_TAB => view.tab = decode_tab(&value),
        PARAM_SCALE => {
            if let Some(t) = option_token(&key, &value) { view.scale = t; }
        }
        PARAM_STANDARD => {
            if let Some(t) = option_token(&key, &value) { view.standard = t; }
        }
        PARAM_BENCHMARK => {
            if let Some(t) = option_token(&key, &value) { view.benchmark = t; }
        }
        PARAM_RAW => view.raw = decode_bool(&value),
        k if is_filter_key(k) => {
            if value.trim().is_empty() {
                malformed(&key, &value);
            } else {
                view.filters.insert(key, value);
            }
        }
        _ => {}
    }
}

fn option_token(key: &str, value: &str) -> Option<String> {
    let v = value.trim().to_ascii_lowercase();
    if OPTION_TOKEN.is_match(&v) {
        Some(v)
    } else {
        malformed(key, value);
        None
    }
}

fn decode_tab(value: &str) -> Option<TabRef> {
    let v = value.trim();
    if let Ok(i) = v.parse::<usize>() {
        return Some(TabRef::Index(i));
    }
    let lower = v.to_ascii_lowercase();
    if OPTION_TOKEN.is_match(&lower) {
        return Some(TabRef::Key(lower));
    }
    malformed(PARAM_TAB, value);
    None
}

fn decode_bool(value: &str) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => true,
        "false" | "0" => false,
        _ => {
            malformed(PARAM_RAW, value);
            false
        }
    }
}

fn malformed(key: &str, value: &str) {
    let err = ViewError::MalformedQueryParam { key: key.to_string(), value: value.to_string() };
    debug!(error = %err, "query: using default");
    metrics::counter!("query_malformed_params_total", 1u64, "key" => key.to_string());
}
