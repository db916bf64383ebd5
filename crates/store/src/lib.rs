//! rtrack dataset store: process-wide, append-only cache of raw datasets.
//!
//! All mutations go through one writer lock and publish a fresh immutable
//! [`StoreSnapshot`] via `ArcSwap`; readers never see a half-applied update.
//! Every publish bumps the epoch on a `watch` channel.

#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use rtrack_core::DatasetStatus;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

mod loader;

pub use loader::{DatasetFetcher, DependencyLoader, Readiness};

/// One named dataset and its load state.
#[derive(Debug, Clone, Serialize, Default)]
pub struct DatasetEntry {
    pub name: String,
    pub status: DatasetStatus,
    #[serde(skip)]
    pub payload: Option<Arc<Value>>,
    /// Bumped on every successful load; selectors key caches on it.
    pub generation: u64,
    pub error: Option<String>,
}

/// Immutable view of every entry at one epoch.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub epoch: u64,
    pub entries: FxHashMap<String, DatasetEntry>,
}

impl StoreSnapshot {
    pub fn get(&self, name: &str) -> Option<&DatasetEntry> { self.entries.get(name) }

    pub fn status(&self, name: &str) -> DatasetStatus { self.get(name).map(|e| e.status).unwrap_or_default() }

    /// Payload of a Ready entry.
    pub fn payload(&self, name: &str) -> Option<&Value> {
        self.get(name).filter(|e| e.status == DatasetStatus::Ready).and_then(|e| e.payload.as_deref())
    }

    pub fn generation(&self, name: &str) -> u64 { self.get(name).map(|e| e.generation).unwrap_or(0) }

    pub fn is_ready(&self, names: &[&str]) -> bool { names.iter().all(|n| self.status(n) == DatasetStatus::Ready) }

    pub fn readiness(&self, names: &[&str]) -> Readiness {
        let mut r = Readiness::default();
        for n in names {
            match self.status(n) {
                DatasetStatus::Ready => {}
                DatasetStatus::Failed => r.failed.push((*n).to_string()),
                DatasetStatus::Unloaded | DatasetStatus::Loading => r.pending.push((*n).to_string()),
            }
        }
        r
    }

    /// Entries sorted by name, for listing.
    pub fn sorted(&self) -> Vec<&DatasetEntry> {
        let mut v: Vec<&DatasetEntry> = self.entries.values().collect();
        v.sort_by(|a, b| a.name.cmp(&b.name));
        v
    }
}

struct Writer {
    entries: FxHashMap<String, DatasetEntry>,
    epoch: u64,
    /// Latest request id per dataset; completions with an older id are stale.
    latest: FxHashMap<String, u64>,
    next_id: u64,
}

/// Shared store. Create once per session and hand out `Arc`s.
pub struct DatasetStore {
    snap: ArcSwap<StoreSnapshot>,
    writer: Mutex<Writer>,
    epoch_tx: watch::Sender<u64>,
}

impl Default for DatasetStore {
    fn default() -> Self { Self::new() }
}

impl DatasetStore {
    pub fn new() -> Self {
        let (epoch_tx, _rx) = watch::channel(0u64);
        Self {
            snap: ArcSwap::from_pointee(StoreSnapshot::default()),
            writer: Mutex::new(Writer { entries: FxHashMap::default(), epoch: 0, latest: FxHashMap::default(), next_id: 0 }),
            epoch_tx,
        }
    }

    pub fn current(&self) -> Arc<StoreSnapshot> { self.snap.load_full() }

    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> { self.epoch_tx.subscribe() }

    fn publish(&self, w: &mut Writer) {
        w.epoch = w.epoch.saturating_add(1);
        let next = StoreSnapshot { epoch: w.epoch, entries: w.entries.clone() };
        self.snap.store(Arc::new(next));
        self.epoch_tx.send_replace(w.epoch);
        metrics::gauge!("dataset_store_epoch", w.epoch as f64);
    }

    /// Claim loads for `names`. Returns `(name, request_id)` for each request to issue.
    ///
    /// Without `force`, entries already Ready or Loading are skipped. With
    /// `force`, a Ready entry keeps serving its payload while the new request runs.
    pub fn begin_load(&self, names: &[&str], force: bool) -> Vec<(String, u64)> {
        let Ok(mut w) = self.writer.lock() else {
            warn!("store: writer lock poisoned");
            return Vec::new();
        };
        let mut claimed = Vec::new();
        for name in names {
            let status = w.entries.get(*name).map(|e| e.status).unwrap_or_default();
            let busy = matches!(status, DatasetStatus::Ready | DatasetStatus::Loading);
            if busy && !force {
                continue;
            }
            w.next_id += 1;
            let id = w.next_id;
            w.latest.insert((*name).to_string(), id);
            let entry = w
                .entries
                .entry((*name).to_string())
                .or_insert_with(|| DatasetEntry { name: (*name).to_string(), ..DatasetEntry::default() });
            if entry.status != DatasetStatus::Ready {
                entry.status = DatasetStatus::Loading;
                entry.error = None;
            }
            debug!(dataset = %name, request_id = id, force, "store: load claimed");
            claimed.push(((*name).to_string(), id));
        }
        if !claimed.is_empty() {
            self.publish(&mut w);
        }
        claimed
    }

    /// Record a completed request. Returns false when the result was stale and dropped.
    pub fn complete(&self, name: &str, request_id: u64, result: Result<Value, String>) -> bool {
        let Ok(mut w) = self.writer.lock() else {
            warn!("store: writer lock poisoned");
            return false;
        };
        if w.latest.get(name).copied() != Some(request_id) {
            debug!(dataset = %name, request_id, "store: stale result discarded");
            metrics::counter!("dataset_stale_results_total", 1u64);
            return false;
        }
        let entry = w
            .entries
            .entry(name.to_string())
            .or_insert_with(|| DatasetEntry { name: name.to_string(), ..DatasetEntry::default() });
        match result {
            Ok(v) => {
                entry.status = DatasetStatus::Ready;
                entry.payload = Some(Arc::new(v));
                entry.generation += 1;
                entry.error = None;
                info!(dataset = %name, generation = entry.generation, "store: dataset ready");
            }
            Err(e) => {
                // Ready stays Ready; the previous payload keeps serving
                if entry.status != DatasetStatus::Ready {
                    entry.status = DatasetStatus::Failed;
                }
                warn!(dataset = %name, error = %e, "store: dataset load failed");
                metrics::counter!("dataset_load_failures_total", 1u64, "dataset" => name.to_string());
                entry.error = Some(e);
            }
        }
        self.publish(&mut w);
        true
    }

    /// Seed a Ready dataset directly (fixtures, preloaded bundles).
    pub fn put_ready(&self, name: &str, payload: Value) {
        let id = match self.writer.lock() {
            Ok(mut w) => {
                w.next_id += 1;
                let id = w.next_id;
                w.latest.insert(name.to_string(), id);
                id
            }
            Err(_) => return,
        };
        self.complete(name, id, Ok(payload));
    }
}
