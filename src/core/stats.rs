//! Per-worker processing time and pool counters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;

use super::item::WorkerId;
use crate::util::clock::elapsed_ms;

/// Cumulative milliseconds processed by each worker.
///
/// Updates merge additively through the map's entry lock, so concurrent
/// workers never lose each other's time.
#[derive(Debug)]
pub struct TimingAggregator {
    per_worker: DashMap<WorkerId, u64>,
    started_at: Instant,
}

impl Default for TimingAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingAggregator {
    /// Start the elapsed-time clock now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            per_worker: DashMap::new(),
            started_at: Instant::now(),
        }
    }

    /// Add `millis` to `worker`'s total.
    pub fn record(&self, worker: WorkerId, millis: u64) {
        let mut total = self.per_worker.entry(worker).or_insert(0);
        *total = total.saturating_add(millis);
    }

    /// Total recorded for `worker`; 0 if it never finished an attempt.
    #[must_use]
    pub fn worker_total(&self, worker: WorkerId) -> u64 {
        self.per_worker.get(&worker).map_or(0, |total| *total)
    }

    /// Copy of all per-worker totals.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<WorkerId, u64> {
        self.per_worker
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    /// Wall-clock milliseconds since the engine started.
    #[must_use]
    pub fn total_elapsed_ms(&self) -> u64 {
        elapsed_ms(self.started_at)
    }
}

/// Point-in-time view of one pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Configured worker count.
    pub worker_count: usize,
    /// Attempts currently running.
    pub active: u64,
    /// Attempts started.
    pub attempts: u64,
    /// Attempts that ended `COMPLETED`.
    pub completed: u64,
    /// Attempts that ended `RETRY`.
    pub retried: u64,
    /// Attempts that ended `FAILED`.
    pub failed: u64,
    /// Items put back untouched after a store failure.
    pub deferred: u64,
}

/// Lock-free counters behind `PoolStats`.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub active: AtomicU64,
    pub attempts: AtomicU64,
    pub completed: AtomicU64,
    pub retried: AtomicU64,
    pub failed: AtomicU64,
    pub deferred: AtomicU64,
}

impl PoolCounters {
    pub fn snapshot(&self, worker_count: usize) -> PoolStats {
        PoolStats {
            worker_count,
            active: self.active.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
        }
    }
}

/// Engine-wide statistics.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    /// Main pool.
    pub main: PoolStats,
    /// Retry pool.
    pub retry: PoolStats,
    /// Items waiting on the main queue.
    pub main_queue_depth: usize,
    /// Items waiting on the retry queue.
    pub retry_queue_depth: usize,
    /// Cumulative milliseconds per worker.
    pub worker_timings: BTreeMap<WorkerId, u64>,
    /// Milliseconds since the engine started.
    pub total_elapsed_ms: u64,
}
