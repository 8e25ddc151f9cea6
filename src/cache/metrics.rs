use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tracks load and eviction activity of the asset cache
#[derive(Debug, Default)]
pub struct CacheMetrics {
    load_times: RwLock<HashMap<String, Duration>>,
    load_counts: RwLock<HashMap<String, u64>>,
    loads_completed: AtomicU64,
    load_failures: AtomicU64,
    stale_loads: AtomicU64,
    evictions: AtomicU64,
    bytes_evicted: AtomicU64,
}

impl CacheMetrics {
    /// Create a new instance of CacheMetrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished load, successful or not
    pub fn record_load(&self, id: &str, duration: Duration, succeeded: bool) {
        self.load_times.write().insert(id.to_string(), duration);
        *self.load_counts.write().entry(id.to_string()).or_insert(0) += 1;
        self.loads_completed.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.load_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a load whose result was dropped because a reload was requested meanwhile
    pub fn record_stale_load(&self) {
        self.stale_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self, bytes: usize) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        self.bytes_evicted.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn loads_completed(&self) -> u64 {
        self.loads_completed.load(Ordering::Relaxed)
    }

    pub fn load_failures(&self) -> u64 {
        self.load_failures.load(Ordering::Relaxed)
    }

    pub fn stale_loads(&self) -> u64 {
        self.stale_loads.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn bytes_evicted(&self) -> u64 {
        self.bytes_evicted.load(Ordering::Relaxed)
    }

    /// Get the duration of the most recent load of an asset
    pub fn last_load_time(&self, id: &str) -> Option<Duration> {
        self.load_times.read().get(id).cloned()
    }

    /// Get the load count for an asset
    pub fn load_count(&self, id: &str) -> u64 {
        *self.load_counts.read().get(id).unwrap_or(&0)
    }

    /// Get all recorded load times
    pub fn all_load_times(&self) -> HashMap<String, Duration> {
        self.load_times.read().clone()
    }

    pub(crate) fn reset(&self) {
        self.load_times.write().clear();
        self.load_counts.write().clear();
        for counter in [
            &self.loads_completed,
            &self.load_failures,
            &self.stale_loads,
            &self.evictions,
            &self.bytes_evicted,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// A thread-safe wrapper around CacheMetrics
#[derive(Debug, Clone, Default)]
pub struct CacheMetricsHandle(Arc<CacheMetrics>);

impl CacheMetricsHandle {
    /// Create a new metrics handle
    pub fn new() -> Self {
        Self(Arc::new(CacheMetrics::new()))
    }

    /// Get a reference to the underlying metrics
    pub fn inner(&self) -> &CacheMetrics {
        &self.0
    }
}

impl std::ops::Deref for CacheMetricsHandle {
    type Target = CacheMetrics;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
