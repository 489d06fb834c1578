//! Bounded in-memory notification log for tests and dashboards.

use std::collections::{BTreeMap, VecDeque};

use parking_lot::Mutex;
use uuid::Uuid;

use super::NotificationEvent;
use crate::core::{Notifier, WorkItem, WorkStatus, WorkerId};

/// Keeps the most recent `max_events` notifications.
pub struct RecordingNotifier {
    events: Mutex<VecDeque<NotificationEvent>>,
    max_events: usize,
}

impl RecordingNotifier {
    /// Create a recorder with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events.min(1024))),
            max_events,
        }
    }

    fn push(&self, event: NotificationEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Snapshot of stored events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Statuses reported for one item, in order.
    #[must_use]
    pub fn status_history(&self, id: Uuid) -> Vec<WorkStatus> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                NotificationEvent::StatusChanged(item) if item.id() == id => Some(item.status()),
                _ => None,
            })
            .collect()
    }

    /// Ids in the order they first entered `status`.
    #[must_use]
    pub fn ids_reaching(&self, status: WorkStatus) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for event in self.events.lock().iter() {
            if let NotificationEvent::StatusChanged(item) = event {
                if item.status() == status && !ids.contains(&item.id()) {
                    ids.push(item.id());
                }
            }
        }
        ids
    }

    /// Most recent status change for `id`.
    #[must_use]
    pub fn last_state(&self, id: Uuid) -> Option<WorkItem> {
        self.events.lock().iter().rev().find_map(|event| match event {
            NotificationEvent::StatusChanged(item) if item.id() == id => Some(item.clone()),
            _ => None,
        })
    }

    /// Number of creation notifications.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, NotificationEvent::Created(_)))
            .count()
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl Notifier for RecordingNotifier {
    fn on_item_created(&self, item: &WorkItem) {
        self.push(NotificationEvent::Created(item.clone()));
    }

    fn on_status_changed(&self, item: &WorkItem) {
        self.push(NotificationEvent::StatusChanged(item.clone()));
    }

    fn on_timing_updated(&self, worker_timings: &BTreeMap<WorkerId, u64>, total_elapsed_ms: u64) {
        self.push(NotificationEvent::TimingUpdated {
            worker_timings: worker_timings.clone(),
            total_elapsed_ms,
        });
    }
}
