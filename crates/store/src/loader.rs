//! Dependency loader: turns "these datasets are needed" into at most one
//! outstanding request per dataset.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::DatasetStore;

/// Transport for raw datasets. Implementations live outside this crate.
#[async_trait::async_trait]
pub trait DatasetFetcher: Send + Sync {
    async fn request(&self, name: &str) -> anyhow::Result<Value>;
}

/// Which of a dependency list is still outstanding and which failed.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Readiness {
    pub pending: Vec<String>,
    pub failed: Vec<String>,
}

impl Readiness {
    pub fn is_ready(&self) -> bool { self.pending.is_empty() && self.failed.is_empty() }
    /// Nothing left in flight (some may have failed).
    pub fn is_settled(&self) -> bool { self.pending.is_empty() }
}

#[derive(Clone)]
pub struct DependencyLoader {
    store: Arc<DatasetStore>,
    fetcher: Arc<dyn DatasetFetcher>,
}

impl DependencyLoader {
    pub fn new(store: Arc<DatasetStore>, fetcher: Arc<dyn DatasetFetcher>) -> Self { Self { store, fetcher } }

    pub fn store(&self) -> &Arc<DatasetStore> { &self.store }

    /// Request every named dataset not already Ready or Loading. Returns how many requests were issued.
    /// Must be called within a tokio runtime.
    pub fn ensure_loaded(&self, names: &[&str]) -> usize {
        let claimed = self.store.begin_load(names, false);
        let n = claimed.len();
        for (name, id) in claimed {
            self.spawn_request(name, id);
        }
        n
    }

    /// Force a fresh request for `name`; the latest request wins.
    pub fn reload(&self, name: &str) {
        for (name, id) in self.store.begin_load(&[name], true) {
            self.spawn_request(name, id);
        }
    }

    pub fn is_ready(&self, names: &[&str]) -> bool { self.store.current().is_ready(names) }

    pub fn readiness(&self, names: &[&str]) -> Readiness { self.store.current().readiness(names) }

    /// Wait until nothing in `names` is pending, or `timeout` elapses.
    pub async fn wait_settled(&self, names: &[&str], timeout: Duration) -> Readiness {
        let mut rx = self.store.subscribe_epoch();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let r = self.readiness(names);
            if r.is_settled() {
                return r;
            }
            match tokio::time::timeout_at(deadline, rx.changed()).await {
                Ok(Ok(())) => continue,
                _ => return self.readiness(names),
            }
        }
    }

    fn spawn_request(&self, name: String, request_id: u64) {
        let store = Arc::clone(&self.store);
        let fetcher = Arc::clone(&self.fetcher);
        metrics::counter!("dataset_requests_total", 1u64, "dataset" => name.clone());
        debug!(dataset = %name, request_id, "loader: request");
        tokio::spawn(async move {
            let t0 = Instant::now();
            // a panicking fetcher must still settle the entry as Failed
            let fetch = tokio::spawn({
                let name = name.clone();
                async move { fetcher.request(&name).await }
            });
            let result = match fetch.await {
                Ok(r) => r.map_err(|e| format!("{:#}", e)),
                Err(e) => {
                    warn!(dataset = %name, request_id, error = %e, "loader: fetch task aborted");
                    Err(format!("fetch task failed: {}", e))
                }
            };
            let ms = t0.elapsed().as_secs_f64() * 1000.0;
            metrics::histogram!("dataset_load_ms", ms, "dataset" => name.clone());
            let applied = store.complete(&name, request_id, result);
            info!(dataset = %name, request_id, applied, took_ms = %format!("{:.1}", ms), "loader: request done");
        });
    }
}
