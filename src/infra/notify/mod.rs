//! Notification sinks.

pub mod channel;
pub mod logger;
pub mod memory;

pub use channel::ChannelNotifier;
pub use logger::LogNotifier;
pub use memory::RecordingNotifier;

use std::collections::BTreeMap;

use crate::core::{WorkItem, WorkerId};

/// One notification, as captured by the buffering sinks.
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    /// `on_item_created`.
    Created(WorkItem),
    /// `on_status_changed`.
    StatusChanged(WorkItem),
    /// `on_timing_updated`.
    TimingUpdated {
        /// Per-worker totals at the time of the call.
        worker_timings: BTreeMap<WorkerId, u64>,
        /// Milliseconds since engine start.
        total_elapsed_ms: u64,
    },
}
