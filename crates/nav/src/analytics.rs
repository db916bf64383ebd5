use std::sync::Mutex;

use rtrack_core::TrackEvent;
use rtrack_query::Location;
use tracing::info;

/// Analytics sink. Delivery failures are the navigator's to swallow.
pub trait Analytics: Send + Sync {
    fn track(&self, event: &TrackEvent) -> anyhow::Result<()>;
}

/// Browser-history-like collaborator; receives every resolved location.
pub trait History: Send + Sync {
    fn push(&self, location: &Location);
}

/// Emits each event as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAnalytics;

impl Analytics for TracingAnalytics {
    fn track(&self, event: &TrackEvent) -> anyhow::Result<()> {
        info!(category = %event.category, action = %event.action, value = ?event.value, "analytics: event");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnalytics;

impl Analytics for NoopAnalytics {
    fn track(&self, _event: &TrackEvent) -> anyhow::Result<()> { Ok(()) }
}

/// In-memory history stack.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<Location>>,
}

impl MemoryHistory {
    pub fn new() -> Self { Self::default() }

    pub fn entries(&self) -> Vec<Location> { self.entries.lock().map(|e| e.clone()).unwrap_or_default() }

    pub fn current(&self) -> Option<Location> { self.entries.lock().ok().and_then(|e| e.last().cloned()) }

    pub fn len(&self) -> usize { self.entries.lock().map(|e| e.len()).unwrap_or(0) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl History for MemoryHistory {
    fn push(&self, location: &Location) {
        if let Ok(mut e) = self.entries.lock() { e.push(location.clone()); }
    }
}
