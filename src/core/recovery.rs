//! Startup reconciliation of persisted, unfinished work.

use dashmap::DashSet;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::EngineError;
use super::item::WorkStatus;
use super::ports::{Notifier, Store};
use super::queue::PriorityWorkQueue;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// Items placed on the main queue.
    pub main: usize,
    /// Items placed on the retry queue.
    pub retry: usize,
    /// Of the main-queue items, how many were found `PROCESSING` and reset to `NEW`.
    pub reclassified: usize,
    /// Items ignored: already owned or finished by this engine, or terminal.
    pub skipped: usize,
}

impl RecoveryReport {
    /// Items enqueued by this pass.
    #[must_use]
    pub const fn enqueued(&self) -> usize {
        self.main + self.retry
    }
}

/// Places recovered items onto the right queue, exactly once.
///
/// The reconciler also tracks every id the engine currently owns (submitted
/// or recovered, not yet terminal) so a repeated pass cannot enqueue an item
/// that is already queued or in flight. Ids that reached a terminal status
/// stay known as finished: a pass working from a store snapshot taken before
/// the item finished must not bring it back.
#[derive(Debug, Default)]
pub struct RecoveryReconciler {
    live: DashSet<Uuid>,
    finished: DashSet<Uuid>,
}

impl RecoveryReconciler {
    /// Create a reconciler that tracks nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an id for the engine. Returns `false` if it is already owned
    /// or has finished.
    pub fn track(&self, id: Uuid) -> bool {
        if self.finished.contains(&id) || !self.live.insert(id) {
            return false;
        }
        // `forget` may have run between the check and the insert.
        if self.finished.contains(&id) {
            self.live.remove(&id);
            return false;
        }
        true
    }

    /// Drop a claim whose item never became durable or visible.
    pub fn release(&self, id: Uuid) {
        self.live.remove(&id);
    }

    /// Stop tracking an id that reached a terminal status.
    pub fn forget(&self, id: Uuid) {
        self.finished.insert(id);
        self.live.remove(&id);
    }

    /// Whether `id` reached a terminal status while owned by this engine.
    #[must_use]
    pub fn is_finished(&self, id: Uuid) -> bool {
        self.finished.contains(&id)
    }

    /// Whether `id` is owned by the engine.
    #[must_use]
    pub fn is_tracked(&self, id: Uuid) -> bool {
        self.live.contains(&id)
    }

    /// Load recoverable items from `store` and enqueue them.
    ///
    /// `RETRY` items go to `retry`; `NEW` and `PROCESSING` items go to `main`,
    /// with `PROCESSING` reset to `NEW`. Each item's status is persisted
    /// before it becomes visible on a queue.
    ///
    /// # Errors
    ///
    /// Any store error aborts the pass. Items already placed stay placed.
    pub fn reconcile<S, N>(
        &self,
        store: &S,
        notifier: &N,
        main: &PriorityWorkQueue,
        retry: &PriorityWorkQueue,
    ) -> Result<RecoveryReport, EngineError>
    where
        S: Store + ?Sized,
        N: Notifier + ?Sized,
    {
        let mut report = RecoveryReport::default();

        for mut item in store.recover_pending()? {
            let id = item.id();
            if !item.status().is_recoverable() {
                warn!(
                    item_id = %id,
                    status = %item.status(),
                    "store returned a terminal item; skipping"
                );
                report.skipped += 1;
                continue;
            }
            // Claiming is the ownership check: whoever inserts first owns the id.
            if !self.track(id) {
                report.skipped += 1;
                continue;
            }

            let reclassified = item.reset_for_recovery();
            if let Err(e) = store.update_status(&item) {
                self.release(id);
                return Err(e);
            }
            notifier.on_item_created(&item);

            if item.status() == WorkStatus::Retry {
                report.retry += 1;
                retry.put(item);
            } else {
                if reclassified {
                    report.reclassified += 1;
                    info!(item_id = %id, "in-flight item from previous run reset to NEW");
                }
                report.main += 1;
                main.put(item);
            }
        }

        info!(
            main = report.main,
            retry = report.retry,
            reclassified = report.reclassified,
            skipped = report.skipped,
            "recovery pass complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use crate::core::item::WorkItem;
    use crate::infra::notify::RecordingNotifier;
    use crate::infra::store::{InMemoryStore, StoredRecord};

    /// Serves pending records but refuses every status write.
    struct ReadOnlyStore(InMemoryStore);

    impl Store for ReadOnlyStore {
        fn recover_pending(&self) -> Result<Vec<WorkItem>, EngineError> {
            self.0.recover_pending()
        }

        fn save(&self, item: &WorkItem) -> Result<(), EngineError> {
            self.0.save(item)
        }

        fn update_status(&self, _item: &WorkItem) -> Result<(), EngineError> {
            Err(EngineError::Store("read-only".into()))
        }
    }

    fn record(status: WorkStatus, retry_count: u32) -> StoredRecord {
        StoredRecord {
            id: Uuid::new_v4(),
            amount: 100.0,
            created_at_ms: 1_000,
            status,
            retry_count,
        }
    }

    fn queues() -> (PriorityWorkQueue, PriorityWorkQueue) {
        (PriorityWorkQueue::new("main"), PriorityWorkQueue::new("retry"))
    }

    #[test]
    fn test_routes_by_status() {
        let new = record(WorkStatus::New, 0);
        let processing = record(WorkStatus::Processing, 1);
        let retrying = record(WorkStatus::Retry, 2);
        let store =
            InMemoryStore::with_records([new.clone(), processing.clone(), retrying.clone()]);
        let notifier = RecordingNotifier::default();
        let (main, retry) = queues();

        let report = RecoveryReconciler::new()
            .reconcile(&store, &notifier, &main, &retry)
            .unwrap();

        assert_eq!(report, RecoveryReport { main: 2, retry: 1, reclassified: 1, skipped: 0 });
        assert!(main.contains(new.id));
        assert!(main.contains(processing.id));
        assert!(retry.contains(retrying.id));
        assert_eq!(notifier.created_count(), 3);
    }

    #[test]
    fn test_processing_is_persisted_as_new() {
        let processing = record(WorkStatus::Processing, 1);
        let store = InMemoryStore::with_records([processing.clone()]);
        let (main, retry) = queues();

        RecoveryReconciler::new()
            .reconcile(&store, &RecordingNotifier::default(), &main, &retry)
            .unwrap();

        let stored = store.get(processing.id).unwrap();
        assert_eq!(stored.status, WorkStatus::New);
        assert_eq!(stored.retry_count, 1);
        let queued: WorkItem = main.try_take().unwrap();
        assert_eq!(queued.status(), WorkStatus::New);
    }

    #[test]
    fn test_second_pass_is_noop() {
        let store = InMemoryStore::with_records([
            record(WorkStatus::New, 0),
            record(WorkStatus::Retry, 1),
        ]);
        let notifier = RecordingNotifier::default();
        let reconciler = RecoveryReconciler::new();
        let (main, retry) = queues();

        let first = reconciler.reconcile(&store, &notifier, &main, &retry).unwrap();
        let second = reconciler.reconcile(&store, &notifier, &main, &retry).unwrap();

        assert_eq!(first.enqueued(), 2);
        assert_eq!(second.enqueued(), 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(main.len() + retry.len(), 2);
    }

    #[test]
    fn test_release_allows_re_recovery() {
        let rec = record(WorkStatus::New, 0);
        let store = InMemoryStore::with_records([rec.clone()]);
        let reconciler = RecoveryReconciler::new();
        let (main, retry) = queues();
        reconciler.reconcile(&store, &RecordingNotifier::default(), &main, &retry).unwrap();
        main.try_take();
        reconciler.release(rec.id);

        let report = reconciler
            .reconcile(&store, &RecordingNotifier::default(), &main, &retry)
            .unwrap();
        assert_eq!(report.main, 1);
    }

    #[test]
    fn test_finished_item_is_not_recovered_from_stale_read() {
        // The store still reports NEW, as a snapshot taken before completion would.
        let rec = record(WorkStatus::New, 0);
        let store = InMemoryStore::with_records([rec.clone()]);
        let reconciler = RecoveryReconciler::new();
        let (main, retry) = queues();
        assert!(reconciler.track(rec.id));
        reconciler.forget(rec.id);

        let report = reconciler
            .reconcile(&store, &RecordingNotifier::default(), &main, &retry)
            .unwrap();

        assert_eq!(report.enqueued(), 0);
        assert!(reconciler.is_finished(rec.id));
        assert!(!reconciler.is_tracked(rec.id));
        assert!(!reconciler.track(rec.id));
    }

    #[test]
    fn test_failed_correction_releases_claim() {
        let rec = record(WorkStatus::Processing, 0);
        let store = ReadOnlyStore(InMemoryStore::with_records([rec.clone()]));
        let reconciler = RecoveryReconciler::new();
        let (main, retry) = queues();

        let result = reconciler.reconcile(&store, &RecordingNotifier::default(), &main, &retry);

        assert!(matches!(result, Err(EngineError::Store(_))));
        assert!(!reconciler.is_tracked(rec.id));
        assert!(main.is_empty());
    }

    #[test]
    fn test_concurrent_passes_enqueue_each_item_once() {
        let records: Vec<_> = (0..50)
            .map(|i| {
                let status = if i % 3 == 0 { WorkStatus::Retry } else { WorkStatus::New };
                record(status, u32::from(i % 3 == 0))
            })
            .collect();
        let store = InMemoryStore::with_records(records);
        let notifier = RecordingNotifier::default();
        let reconciler = RecoveryReconciler::new();
        let (main, retry) = queues();

        let enqueued: usize = thread::scope(|s| {
            let passes: Vec<_> = (0..8)
                .map(|_| s.spawn(|| reconciler.reconcile(&store, &notifier, &main, &retry)))
                .collect();
            passes
                .into_iter()
                .map(|pass| pass.join().unwrap().unwrap().enqueued())
                .sum()
        });

        assert_eq!(enqueued, 50);
        assert_eq!(main.len() + retry.len(), 50);
        assert_eq!(notifier.created_count(), 50);
    }

    #[test]
    fn test_claimed_id_is_skipped() {
        let rec = record(WorkStatus::New, 0);
        let store = InMemoryStore::with_records([rec.clone()]);
        let reconciler = RecoveryReconciler::new();
        let (main, retry) = queues();
        assert!(reconciler.track(rec.id));
        assert!(!reconciler.track(rec.id));

        let report = reconciler
            .reconcile(&store, &RecordingNotifier::default(), &main, &retry)
            .unwrap();

        assert_eq!(report.enqueued(), 0);
        assert_eq!(report.skipped, 1);
        assert!(main.is_empty());
    }
}
