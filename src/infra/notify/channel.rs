//! Notifier forwarding events over a bounded crossbeam channel.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use super::NotificationEvent;
use crate::core::{Notifier, WorkItem, WorkerId};

/// Sends every notification to a consumer thread without ever blocking a
/// worker. When the channel is full or the receiver is gone the event is
/// dropped and counted.
pub struct ChannelNotifier {
    tx: Sender<NotificationEvent>,
    dropped: AtomicU64,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, Receiver<NotificationEvent>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Events discarded because the consumer fell behind or went away.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn send(&self, event: NotificationEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("notification channel full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Notifier for ChannelNotifier {
    fn on_item_created(&self, item: &WorkItem) {
        self.send(NotificationEvent::Created(item.clone()));
    }

    fn on_status_changed(&self, item: &WorkItem) {
        self.send(NotificationEvent::StatusChanged(item.clone()));
    }

    fn on_timing_updated(&self, worker_timings: &BTreeMap<WorkerId, u64>, total_elapsed_ms: u64) {
        self.send(NotificationEvent::TimingUpdated {
            worker_timings: worker_timings.clone(),
            total_elapsed_ms,
        });
    }
}
