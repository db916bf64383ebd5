//! rtrack public API facade (in-process).
//!
//! This crate defines the surface render layers depend on: reads of the
//! current location, view state and view models, plus the only mutation entry
//! points (navigate, set tab, set raw, set locale, ensure loaded).

#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rtrack_core::ViewState;
use rtrack_fetch::DirFetcher;
use rtrack_nav::{
    Analytics, History, MemoryHistory, NavError, NavigationIntent, Navigator, SetLocaleCommand, SetRawCommand,
    SetTabCommand, TracingAnalytics, DEFAULT_LOCALE,
};
use rtrack_query::Location;
use rtrack_select::{CountryViewModel, MetricViewModel, Selected, SelectorCache};
use rtrack_store::{DatasetFetcher, DatasetStore, DependencyLoader, Readiness};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

/// Runtime configuration read from `RTRACK_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub data_dir: PathBuf,
    pub wait_secs: u64,
    pub metrics_addr: Option<String>,
    pub default_locale: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("./data"), wait_secs: 8, metrics_addr: None, default_locale: DEFAULT_LOCALE.to_string() }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        let data_dir = std::env::var("RTRACK_DATA_DIR").ok().map(PathBuf::from).unwrap_or(d.data_dir);
        let wait_secs = std::env::var("RTRACK_WAIT_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(d.wait_secs);
        let metrics_addr = std::env::var("RTRACK_METRICS_ADDR").ok().filter(|s| !s.trim().is_empty());
        let default_locale = std::env::var("RTRACK_DEFAULT_LOCALE")
            .ok()
            .filter(|l| rtrack_nav::is_app_locale(l))
            .unwrap_or(d.default_locale);
        Self { data_dir, wait_secs, metrics_addr, default_locale }
    }

    pub fn wait(&self) -> Duration { Duration::from_secs(self.wait_secs) }

    /// Landing location for a fresh session.
    pub fn home(&self) -> Location {
        if self.default_locale == DEFAULT_LOCALE { Location::new("/", "") } else { Location::new(&self.default_locale, "") }
    }
}

/// API errors suitable for transport.
#[derive(Debug, thiserror::Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ApiError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("not_found: {0}")]
    NotFound(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl From<NavError> for ApiError {
    fn from(e: NavError) -> Self { ApiError::Validation(e.to_string()) }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Surface used by render layers.
#[async_trait::async_trait]
pub trait ViewApi: Send + Sync {
    fn current_location(&self) -> Location;

    /// View state decoded from the current location.
    fn current_view_state(&self) -> ViewState;

    /// Country report model for `code`, gated on its dependencies.
    fn entity_view_model(&self, code: &str) -> Selected<CountryViewModel>;

    fn metric_view_model(&self, code: &str) -> Selected<MetricViewModel>;

    fn is_ready(&self, names: &[&str]) -> bool;

    /// Epoch bumps whenever a dataset changes state.
    fn subscribe(&self) -> watch::Receiver<u64>;

    fn navigate(&self, intent: NavigationIntent) -> Location;

    fn set_tab(&self, cmd: SetTabCommand) -> ApiResult<Location>;

    /// Toggle raw indicator values, keeping page and tab.
    fn set_raw(&self, cmd: SetRawCommand) -> Location;

    fn set_locale(&self, cmd: SetLocaleCommand) -> ApiResult<Location>;

    /// Request missing datasets; returns how many requests were issued.
    fn ensure_loaded(&self, names: &[&str]) -> usize;

    /// Wait until none of `names` is pending or `timeout` elapses.
    async fn wait_ready(&self, names: &[&str], timeout: Duration) -> Readiness;
}

/// In-process implementation wiring store, loader, navigator and selectors.
pub struct InProcApi {
    loader: DependencyLoader,
    navigator: Navigator,
    cache: SelectorCache,
    location: Mutex<Location>,
}

impl InProcApi {
    pub fn new(
        store: Arc<DatasetStore>,
        fetcher: Arc<dyn DatasetFetcher>,
        analytics: Arc<dyn Analytics>,
        history: Arc<dyn History>,
        start: Location,
    ) -> Self {
        Self {
            loader: DependencyLoader::new(store, fetcher),
            navigator: Navigator::new(analytics, history),
            cache: SelectorCache::new(),
            location: Mutex::new(start),
        }
    }

    /// Directory-backed datasets, tracing analytics, in-memory history.
    pub fn from_config(cfg: &RuntimeConfig) -> Self {
        info!(data_dir = %cfg.data_dir.display(), locale = %cfg.default_locale, "api: in-proc init");
        Self::new(
            Arc::new(DatasetStore::new()),
            Arc::new(DirFetcher::new(cfg.data_dir.clone())),
            Arc::new(TracingAnalytics),
            Arc::new(MemoryHistory::new()),
            cfg.home(),
        )
    }

    pub fn store(&self) -> &Arc<DatasetStore> { self.loader.store() }

    pub fn loader(&self) -> &DependencyLoader { &self.loader }

    fn replace_location(&self, next: Location) -> Location {
        if let Ok(mut l) = self.location.lock() { *l = next.clone(); }
        next
    }
}

#[async_trait::async_trait]
impl ViewApi for InProcApi {
    fn current_location(&self) -> Location { self.location.lock().map(|l| l.clone()).unwrap_or_default() }

    fn current_view_state(&self) -> ViewState { self.current_location().view_state() }

    fn entity_view_model(&self, code: &str) -> Selected<CountryViewModel> {
        let t0 = Instant::now();
        let out = rtrack_select::country_view_model(&self.store().current(), &self.current_view_state(), code, &self.cache);
        metrics::histogram!("select_country_ms", t0.elapsed().as_secs_f64() * 1000.0);
        out
    }

    fn metric_view_model(&self, code: &str) -> Selected<MetricViewModel> {
        rtrack_select::metric_view_model(&self.store().current(), &self.current_view_state(), code)
    }

    fn is_ready(&self, names: &[&str]) -> bool { self.loader.is_ready(names) }

    fn subscribe(&self) -> watch::Receiver<u64> { self.store().subscribe_epoch() }

    fn navigate(&self, intent: NavigationIntent) -> Location {
        let current = self.current_location();
        self.replace_location(self.navigator.navigate(intent, &current))
    }

    fn set_tab(&self, cmd: SetTabCommand) -> ApiResult<Location> {
        let current = self.current_location();
        Ok(self.replace_location(self.navigator.set_tab(cmd, &current)?))
    }

    fn set_raw(&self, cmd: SetRawCommand) -> Location {
        let current = self.current_location();
        self.replace_location(self.navigator.set_raw(cmd, &current))
    }

    fn set_locale(&self, cmd: SetLocaleCommand) -> ApiResult<Location> {
        let current = self.current_location();
        Ok(self.replace_location(self.navigator.set_locale(cmd, &current)?))
    }

    fn ensure_loaded(&self, names: &[&str]) -> usize { self.loader.ensure_loaded(names) }

    async fn wait_ready(&self, names: &[&str], timeout: Duration) -> Readiness { self.loader.wait_settled(names, timeout).await }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_lands_on_root() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.home().href(), "/");
        assert_eq!(cfg.wait(), Duration::from_secs(8));
        let fr = RuntimeConfig { default_locale: "fr".into(), ..RuntimeConfig::default() };
        assert_eq!(fr.home().href(), "/fr");
    }

    #[test]
    fn nav_errors_map_to_validation() {
        let e: ApiError = NavError::UnknownLocale("xx".into()).into();
        assert!(matches!(e, ApiError::Validation(_)));
    }
}
