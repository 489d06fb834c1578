//! Outbound ports: durable status bookkeeping and change notifications.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::EngineError;
use super::item::{WorkItem, WorkerId};

/// Durable record of every item's identity, amount, creation time, status
/// and retry count.
///
/// All methods are called from worker threads and must be safe for
/// concurrent use without external locking.
pub trait Store: Send + Sync + 'static {
    /// Every item whose persisted status is `NEW`, `PROCESSING` or `RETRY`.
    ///
    /// # Errors
    ///
    /// `EngineError::Store` when the backend cannot be read.
    fn recover_pending(&self) -> Result<Vec<WorkItem>, EngineError>;

    /// Record a newly created item.
    ///
    /// # Errors
    ///
    /// `EngineError::Store` when the write does not become durable.
    fn save(&self, item: &WorkItem) -> Result<(), EngineError>;

    /// Persist `status` and `retry_count`. This is the durability checkpoint
    /// after every transition.
    ///
    /// # Errors
    ///
    /// `EngineError::Store` when the write does not become durable.
    fn update_status(&self, item: &WorkItem) -> Result<(), EngineError>;

    /// Release backend resources. Called once both pools have stopped.
    ///
    /// # Errors
    ///
    /// `EngineError::Store` when flushing fails.
    fn close(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn recover_pending(&self) -> Result<Vec<WorkItem>, EngineError> {
        (**self).recover_pending()
    }

    fn save(&self, item: &WorkItem) -> Result<(), EngineError> {
        (**self).save(item)
    }

    fn update_status(&self, item: &WorkItem) -> Result<(), EngineError> {
        (**self).update_status(item)
    }

    fn close(&self) -> Result<(), EngineError> {
        (**self).close()
    }
}

/// Receiver of state-change notifications, typically a presentation layer.
///
/// Calls are fire-and-forget and happen on worker threads; implementations
/// must return promptly.
pub trait Notifier: Send + Sync + 'static {
    /// A new item was accepted (or recovered from the store).
    fn on_item_created(&self, item: &WorkItem);

    /// An item changed status.
    fn on_status_changed(&self, item: &WorkItem);

    /// Per-worker totals and wall-clock time since start, after a transition.
    fn on_timing_updated(&self, worker_timings: &BTreeMap<WorkerId, u64>, total_elapsed_ms: u64) {
        let _ = (worker_timings, total_elapsed_ms);
    }
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn on_item_created(&self, item: &WorkItem) {
        (**self).on_item_created(item);
    }

    fn on_status_changed(&self, item: &WorkItem) {
        (**self).on_status_changed(item);
    }

    fn on_timing_updated(&self, worker_timings: &BTreeMap<WorkerId, u64>, total_elapsed_ms: u64) {
        (**self).on_timing_updated(worker_timings, total_elapsed_ms);
    }
}
