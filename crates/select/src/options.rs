use rtrack_core::taxonomy::{self, BenchmarkSpec, ScaleSpec, StandardSpec};
use rtrack_core::{ViewState, PARAM_BENCHMARK, PARAM_SCALE, PARAM_STANDARD};
use serde::Serialize;
use tracing::debug;

/// A view option the URL asked for that had to be replaced by its default.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Substitution {
    pub param: &'static str,
    pub requested: String,
    pub used: &'static str,
}

/// Display options after the fallback policy has run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub scale: &'static str,
    pub standard: &'static str,
    pub benchmark: &'static str,
    pub raw: bool,
    pub substitutions: Vec<Substitution>,
}

impl ResolvedOptions {
    pub fn scale_spec(&self) -> &'static ScaleSpec { taxonomy::scale_for(self.scale).unwrap_or_else(taxonomy::default_scale) }
    pub fn standard_spec(&self) -> &'static StandardSpec { taxonomy::standard_for(self.standard).unwrap_or_else(taxonomy::default_standard) }
    pub fn benchmark_spec(&self) -> &'static BenchmarkSpec { taxonomy::benchmark_for(self.benchmark).unwrap_or_else(taxonomy::default_benchmark) }
}

impl Default for ResolvedOptions {
    fn default() -> Self { resolve_options(&ViewState::default()) }
}

/// Unknown option tokens resolve to the default option; each swap is recorded.
pub fn resolve_options(view: &ViewState) -> ResolvedOptions {
    let mut substitutions = Vec::new();
    let mut pick = |param: &'static str, requested: &str, found: Option<&'static str>, default: &'static str| match found {
        Some(k) => k,
        None => {
            debug!(param, requested = %requested, used = default, "select: unknown option; using default");
            substitutions.push(Substitution { param, requested: requested.to_string(), used: default });
            default
        }
    };
    let scale = pick(PARAM_SCALE, &view.scale, taxonomy::scale_for(&view.scale).map(|s| s.key), taxonomy::DEFAULT_SCALE);
    let standard =
        pick(PARAM_STANDARD, &view.standard, taxonomy::standard_for(&view.standard).map(|s| s.key), taxonomy::DEFAULT_STANDARD);
    let benchmark =
        pick(PARAM_BENCHMARK, &view.benchmark, taxonomy::benchmark_for(&view.benchmark).map(|s| s.key), taxonomy::DEFAULT_BENCHMARK);
    ResolvedOptions { scale, standard, benchmark, raw: view.raw, substitutions }
}
