//! The engine: queues, pools, ports and the submission API.
//!
//! Startup order is fixed: validate configuration, reconcile recovered work
//! onto the queues, then spawn the pools. `submit` is only reachable once
//! `start` has returned, so recovered items are always status-corrected
//! before new work is accepted.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::cancel::CancellationToken;
use super::error::EngineError;
use super::executor::Processor;
use super::item::{PoolKind, WorkItem, WorkStatus};
use super::ports::{Notifier, Store};
use super::queue::PriorityWorkQueue;
use super::recovery::{RecoveryReconciler, RecoveryReport};
use super::retry::RetryPolicy;
use super::stats::{EngineStats, PoolCounters, TimingAggregator};
use super::worker_pool::WorkerPool;
use crate::config::EngineConfig;

/// State shared between the engine handle and every worker thread.
pub(crate) struct EngineShared<S, N, P> {
    pub config: EngineConfig,
    pub policy: RetryPolicy,
    pub main_queue: Arc<PriorityWorkQueue>,
    pub retry_queue: Arc<PriorityWorkQueue>,
    pub store: S,
    pub notifier: N,
    pub processor: P,
    pub timings: TimingAggregator,
    pub reconciler: RecoveryReconciler,
    pub token: CancellationToken,
    pub main_counters: PoolCounters,
    pub retry_counters: PoolCounters,
}

impl<S, N, P> EngineShared<S, N, P>
where
    S: Store,
    N: Notifier,
    P: Processor,
{
    pub fn new(config: EngineConfig, store: S, notifier: N, processor: P) -> Self {
        let token = CancellationToken::new();
        let main_queue = Arc::new(PriorityWorkQueue::new("main"));
        let retry_queue = Arc::new(PriorityWorkQueue::new("retry"));
        token.register(&main_queue);
        token.register(&retry_queue);
        Self {
            policy: RetryPolicy::from(&config),
            config,
            main_queue,
            retry_queue,
            store,
            notifier,
            processor,
            timings: TimingAggregator::new(),
            reconciler: RecoveryReconciler::new(),
            token,
            main_counters: PoolCounters::default(),
            retry_counters: PoolCounters::default(),
        }
    }

    pub fn queue(&self, kind: PoolKind) -> &PriorityWorkQueue {
        match kind {
            PoolKind::Main => self.main_queue.as_ref(),
            PoolKind::Retry => self.retry_queue.as_ref(),
        }
    }

    /// Queue an enqueueable item belongs on.
    pub fn home_queue(&self, status: WorkStatus) -> &PriorityWorkQueue {
        if status == WorkStatus::Retry {
            self.retry_queue.as_ref()
        } else {
            self.main_queue.as_ref()
        }
    }

    pub fn counters(&self, kind: PoolKind) -> &PoolCounters {
        match kind {
            PoolKind::Main => &self.main_counters,
            PoolKind::Retry => &self.retry_counters,
        }
    }

    /// Persist a transition, then report it.
    pub fn publish(&self, item: &WorkItem) -> Result<(), EngineError> {
        self.store.update_status(item)?;
        self.notifier.on_status_changed(item);
        self.notifier
            .on_timing_updated(&self.timings.snapshot(), self.timings.total_elapsed_ms());
        Ok(())
    }

    fn stats(&self) -> EngineStats {
        EngineStats {
            main: self.main_counters.snapshot(self.config.main_workers),
            retry: self.retry_counters.snapshot(self.config.retry_workers),
            main_queue_depth: self.main_queue.len(),
            retry_queue_depth: self.retry_queue.len(),
            worker_timings: self.timings.snapshot(),
            total_elapsed_ms: self.timings.total_elapsed_ms(),
        }
    }
}

/// What `Engine::shutdown` managed to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Workers that exited within the grace period.
    pub joined: usize,
    /// Workers still busy when the grace period ran out; left to finish detached.
    pub detached: usize,
    /// Whether the store was closed. Only attempted once every worker stopped.
    pub store_closed: bool,
}

/// Priority scheduling and retry engine.
///
/// # Example
///
/// ```rust,ignore
/// use txn_engine::config::EngineConfig;
/// use txn_engine::core::{processor_fn, Engine};
/// use txn_engine::infra::{InMemoryStore, LogNotifier};
///
/// let engine = Engine::start(
///     EngineConfig::new().with_main_workers(4),
///     InMemoryStore::new(),
///     LogNotifier,
///     processor_fn(|item, _ctx| (item.amount() < 10_000.0).into()),
/// )?;
/// let item = engine.submit(250.0)?;
/// // ...
/// let report = engine.shutdown();
/// ```
pub struct Engine<S, N, P>
where
    S: Store,
    N: Notifier,
    P: Processor,
{
    shared: Arc<EngineShared<S, N, P>>,
    pools: Mutex<Vec<WorkerPool>>,
}

impl<S, N, P> Engine<S, N, P>
where
    S: Store,
    N: Notifier,
    P: Processor,
{
    /// Recover pending work from `store` and start both worker pools.
    ///
    /// # Errors
    ///
    /// - `EngineError::InvalidConfig` if `config` fails validation
    /// - `EngineError::Store` if recovery cannot read or correct the store
    /// - `EngineError::Spawn` if a worker thread cannot be created
    pub fn start(
        config: EngineConfig,
        store: S,
        notifier: N,
        processor: P,
    ) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;
        let shared = Arc::new(EngineShared::new(config, store, notifier, processor));

        let recovered = shared.reconciler.reconcile(
            &shared.store,
            &shared.notifier,
            &shared.main_queue,
            &shared.retry_queue,
        )?;

        let mut pools = Vec::with_capacity(2);
        for (kind, count) in [
            (PoolKind::Main, shared.config.main_workers),
            (PoolKind::Retry, shared.config.retry_workers),
        ] {
            match WorkerPool::spawn(kind, count, &shared) {
                Ok(pool) => pools.push(pool),
                Err(e) => {
                    error!(pool = kind.label(), error = %e, "failed to start worker pool");
                    shared.token.cancel();
                    return Err(e);
                }
            }
        }

        info!(
            main_workers = shared.config.main_workers,
            retry_workers = shared.config.retry_workers,
            max_retry = shared.config.max_retry,
            retry_delay_ms = shared.config.retry_delay_ms,
            recovered = recovered.enqueued(),
            "engine started"
        );

        Ok(Self {
            shared,
            pools: Mutex::new(pools),
        })
    }

    /// Accept a new transaction with a generated id.
    ///
    /// The item is persisted, announced and placed on the main queue before
    /// this returns. The returned value is a snapshot; the live item belongs
    /// to the queue.
    ///
    /// # Errors
    ///
    /// - `EngineError::ShutDown` once shutdown has begun
    /// - `EngineError::InvalidAmount` for a non-positive or non-finite amount
    /// - `EngineError::Store` if the item cannot be saved; nothing is enqueued
    pub fn submit(&self, amount: f64) -> Result<WorkItem, EngineError> {
        self.submit_with_id(Uuid::new_v4(), amount)
    }

    /// Accept a new transaction with a caller-supplied id.
    ///
    /// # Errors
    ///
    /// Same as `submit`; an id this engine already owns, or one the store
    /// rejects as a duplicate, surfaces as `EngineError::Store`.
    pub fn submit_with_id(&self, id: Uuid, amount: f64) -> Result<WorkItem, EngineError> {
        if self.shared.token.is_cancelled() {
            return Err(EngineError::ShutDown);
        }
        let item = WorkItem::with_id(id, amount)?;
        // Claim before saving so a concurrent recovery pass sees the id as owned.
        if !self.shared.reconciler.track(id) {
            return Err(EngineError::Store(format!("duplicate id {id}")));
        }
        if let Err(e) = self.shared.store.save(&item) {
            self.shared.reconciler.release(id);
            return Err(e);
        }
        self.shared.notifier.on_item_created(&item);
        self.shared.main_queue.put(item.clone());
        debug!(item_id = %id, amount, "item submitted");
        Ok(item)
    }

    /// Run another recovery pass. Items this engine already owns are skipped,
    /// so repeated calls never double-enqueue.
    ///
    /// # Errors
    ///
    /// `EngineError::ShutDown` after shutdown; `EngineError::Store` on
    /// backend failure.
    pub fn recover(&self) -> Result<RecoveryReport, EngineError> {
        if self.shared.token.is_cancelled() {
            return Err(EngineError::ShutDown);
        }
        self.shared.reconciler.reconcile(
            &self.shared.store,
            &self.shared.notifier,
            &self.shared.main_queue,
            &self.shared.retry_queue,
        )
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.shared.stats()
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Retry policy derived from the configuration.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.shared.policy
    }

    /// The store port.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.shared.store
    }

    /// The notification port.
    #[must_use]
    pub fn notifier(&self) -> &N {
        &self.shared.notifier
    }

    /// Whether shutdown has begun.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    /// Stop both pools and release the store.
    ///
    /// New submissions are refused and blocked workers wake immediately.
    /// In-flight attempts get `shutdown_grace_ms` to finish; workers still
    /// running after that are detached. The store is closed only if every
    /// worker stopped. Calling this again returns an empty report.
    pub fn shutdown(&self) -> ShutdownReport {
        if !self.shared.token.cancel() {
            return ShutdownReport::default();
        }
        info!("shutting down engine");

        let deadline = Instant::now() + self.shared.config.shutdown_grace();
        let mut report = ShutdownReport::default();
        for pool in self.pools.lock().drain(..) {
            let joined = pool.join_until(deadline);
            report.joined += joined.joined;
            report.detached += joined.detached;
        }

        if report.detached == 0 {
            match self.shared.store.close() {
                Ok(()) => report.store_closed = true,
                Err(e) => error!(error = %e, "failed to close store"),
            }
        } else {
            warn!(detached = report.detached, "workers still running; leaving store open");
        }

        info!(
            joined = report.joined,
            detached = report.detached,
            store_closed = report.store_closed,
            "engine shut down"
        );
        report
    }
}

impl<S, N, P> Drop for Engine<S, N, P>
where
    S: Store,
    N: Notifier,
    P: Processor,
{
    fn drop(&mut self) {
        // Signal only; joining here could hang on a slow processor.
        if self.shared.token.cancel() {
            debug!("engine dropped without explicit shutdown - workers will be detached");
        }
    }
}
