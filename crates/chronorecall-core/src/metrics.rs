//! Process-wide atomic counters for the analysis engine.
//!
//! Counters are bumped silently at the call site. [`Metrics::flush`] emits
//! the current values as one `tracing::info!` event, e.g. when the CLI
//! finishes a command.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    datasets_loaded: AtomicU64,
    loads_rejected: AtomicU64,
    queries_served: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_coalesced: AtomicU64,
    computations_run: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub datasets_loaded: u64,
    pub loads_rejected: u64,
    pub queries_served: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_coalesced: u64,
    pub computations_run: u64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            datasets_loaded: AtomicU64::new(0),
            loads_rejected: AtomicU64::new(0),
            queries_served: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cache_coalesced: AtomicU64::new(0),
            computations_run: AtomicU64::new(0),
        }
    }

    fn bump(counter: &AtomicU64, name: &'static str) {
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = name, "counter incremented");
    }

    pub fn inc_datasets_loaded(&self) {
        Self::bump(&self.datasets_loaded, "datasets_loaded");
    }

    pub fn inc_loads_rejected(&self) {
        Self::bump(&self.loads_rejected, "loads_rejected");
    }

    pub fn inc_queries_served(&self) {
        Self::bump(&self.queries_served, "queries_served");
    }

    pub fn inc_cache_hits(&self) {
        Self::bump(&self.cache_hits, "cache_hits");
    }

    pub fn inc_cache_misses(&self) {
        Self::bump(&self.cache_misses, "cache_misses");
    }

    /// A caller attached to a computation already in flight.
    pub fn inc_cache_coalesced(&self) {
        Self::bump(&self.cache_coalesced, "cache_coalesced");
    }

    pub fn inc_computations_run(&self) {
        Self::bump(&self.computations_run, "computations_run");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            datasets_loaded: self.datasets_loaded.load(Ordering::Relaxed),
            loads_rejected: self.loads_rejected.load(Ordering::Relaxed),
            queries_served: self.queries_served.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_coalesced: self.cache_coalesced.load(Ordering::Relaxed),
            computations_run: self.computations_run.load(Ordering::Relaxed),
        }
    }

    /// Emit all counters as a single `info!` event.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            datasets_loaded = s.datasets_loaded,
            loads_rejected = s.loads_rejected,
            queries_served = s.queries_served,
            cache_hits = s.cache_hits,
            cache_misses = s.cache_misses,
            cache_coalesced = s.cache_coalesced,
            computations_run = s.computations_run,
        );
    }

    /// Zero every counter (tests).
    pub fn reset(&self) {
        for counter in [
            &self.datasets_loaded,
            &self.loads_rejected,
            &self.queries_served,
            &self.cache_hits,
            &self.cache_misses,
            &self.cache_coalesced,
            &self.computations_run,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());

        m.inc_cache_misses();
        m.inc_computations_run();
        m.inc_cache_hits();
        m.inc_cache_hits();
        m.inc_cache_coalesced();

        let s = m.snapshot();
        assert_eq!(s.cache_hits, 2);
        assert_eq!(s.cache_misses, 1);
        assert_eq!(s.cache_coalesced, 1);
        assert_eq!(s.computations_run, 1);
        assert_eq!(s.datasets_loaded, 0);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_datasets_loaded();
        m.inc_loads_rejected();
        m.inc_queries_served();
        m.reset();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }
}
