//! Bounded, single-flight query cache.
//!
//! Completed values live in an LRU keyed by [`Fingerprint`]. A miss installs
//! a shared pending future so concurrent callers for the same fingerprint
//! await one computation instead of starting their own. The lock is held to
//! look up and register work, never while the work runs.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::fingerprint::Fingerprint;
use crate::metrics::METRICS;

type PendingFuture<V> = Shared<BoxFuture<'static, Result<Arc<V>>>>;

struct Pending<V> {
    /// Distinguishes this computation from a later one for the same key.
    ticket: u64,
    future: PendingFuture<V>,
}

struct Inner<V> {
    entries: LruCache<Fingerprint, Arc<V>>,
    pending: HashMap<Fingerprint, Pending<V>>,
    next_ticket: u64,
    /// Results for generations below this are not stored.
    min_generation: u64,
}

/// Occupancy at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub in_flight: usize,
}

pub struct QueryCache<V> {
    inner: Mutex<Inner<V>>,
}

impl<V> std::fmt::Debug for QueryCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache").finish_non_exhaustive()
    }
}

impl<V> QueryCache<V>
where
    V: Send + Sync + 'static,
{
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| EngineError::Config("cache capacity must be at least 1".to_string()))?;
        Ok(Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                pending: HashMap::new(),
                next_ticket: 0,
                min_generation: 0,
            }),
        })
    }

    /// Return the cached value for `key`, or run `compute` to produce it.
    ///
    /// At most one computation per key runs at a time; callers arriving
    /// while it is in flight share its outcome, errors included. Errors are
    /// never stored, so the next caller retries.
    pub async fn get_or_compute<F, Fut>(&self, key: Fingerprint, compute: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let (ticket, future) = {
            let mut inner = self.inner.lock().await;

            if let Some(value) = inner.entries.get(&key) {
                METRICS.inc_cache_hits();
                debug!(fingerprint = %key.short(), "cache hit");
                return Ok(Arc::clone(value));
            }

            if let Some(pending) = inner.pending.get(&key) {
                METRICS.inc_cache_coalesced();
                debug!(fingerprint = %key.short(), "joined in-flight computation");
                (pending.ticket, pending.future.clone())
            } else {
                METRICS.inc_cache_misses();
                debug!(fingerprint = %key.short(), "cache miss");
                inner.next_ticket += 1;
                let ticket = inner.next_ticket;
                // `compute` only builds the future; nothing runs until it is
                // polled below, outside the lock.
                let work = compute();
                let future = async move {
                    METRICS.inc_computations_run();
                    work.await.map(Arc::new)
                }
                .boxed()
                .shared();
                inner.pending.insert(
                    key.clone(),
                    Pending {
                        ticket,
                        future: future.clone(),
                    },
                );
                (ticket, future)
            }
        };

        let outcome = future.await;
        self.settle(&key, ticket, &outcome).await;
        outcome
    }

    /// Retire the pending entry for `ticket` and store a successful value.
    ///
    /// Every waiter calls this; only the first to arrive finds its ticket
    /// still registered.
    async fn settle(&self, key: &Fingerprint, ticket: u64, outcome: &Result<Arc<V>>) {
        let mut inner = self.inner.lock().await;
        let registered = inner
            .pending
            .get(key)
            .is_some_and(|pending| pending.ticket == ticket);
        if !registered {
            return;
        }
        inner.pending.remove(key);

        match outcome {
            Ok(value) if key.generation() >= inner.min_generation => {
                inner.entries.put(key.clone(), Arc::clone(value));
            }
            Ok(_) => {
                debug!(fingerprint = %key.short(), "discarding result for retired generation");
            }
            Err(error) => {
                debug!(fingerprint = %key.short(), %error, "computation failed, not cached");
            }
        }
    }

    /// Drop every entry, pending or complete, for generations below
    /// `generation`, and refuse to store them afterwards.
    ///
    /// Callers already awaiting a dropped pending computation still receive
    /// its outcome.
    pub async fn retain_generation(&self, generation: u64) {
        let mut inner = self.inner.lock().await;
        inner.min_generation = inner.min_generation.max(generation);
        let floor = inner.min_generation;

        let stale: Vec<Fingerprint> = inner
            .entries
            .iter()
            .filter(|(key, _)| key.generation() < floor)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            inner.entries.pop(key);
        }
        inner.pending.retain(|key, _| key.generation() >= floor);
        debug!(generation = floor, evicted = stale.len(), "retired cache generations");
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().await;
        CacheStats {
            entries: inner.entries.len(),
            capacity: inner.entries.cap().get(),
            in_flight: inner.pending.len(),
        }
    }
}
