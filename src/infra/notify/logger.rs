//! Notifier that emits tracing events.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::core::{Notifier, WorkItem, WorkerId};

/// Default sink: logs creations and status changes, and timing at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn on_item_created(&self, item: &WorkItem) {
        info!(
            item_id = %item.id(),
            amount = item.amount(),
            status = %item.status(),
            "item created"
        );
    }

    fn on_status_changed(&self, item: &WorkItem) {
        info!(
            item_id = %item.id(),
            status = %item.status(),
            retry_count = item.retry_count(),
            processing_ms = item.processing_time_ms(),
            "item status changed"
        );
    }

    fn on_timing_updated(&self, worker_timings: &BTreeMap<WorkerId, u64>, total_elapsed_ms: u64) {
        debug!(workers = worker_timings.len(), total_elapsed_ms, "timings updated");
    }
}
