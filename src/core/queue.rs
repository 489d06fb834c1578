//! Blocking priority queue shared by the workers of one pool.
//!
//! Items are ordered by amount (largest first), then by creation time
//! (oldest first), then by arrival. `take` parks the caller on a
//! `parking_lot::Condvar` until an item arrives or the cancellation token
//! fires; there is no polling.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use parking_lot::{Condvar, Mutex};
use uuid::Uuid;

use super::cancel::{CancellationToken, Interruptible};
use super::item::WorkItem;

/// Heap entry: the item plus its arrival sequence for stable ties.
struct QueuedItem {
    item: WorkItem,
    seq: u64,
}

impl PartialEq for QueuedItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedItem {}

impl PartialOrd for QueuedItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: Greater pops first, so earlier arrival must compare Greater.
        self.item
            .priority_cmp(&other.item)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueueState {
    heap: BinaryHeap<QueuedItem>,
    next_seq: u64,
}

/// Thread-safe blocking priority queue of work items.
pub struct PriorityWorkQueue {
    name: &'static str,
    state: Mutex<QueueState>,
    available: Condvar,
}

impl PriorityWorkQueue {
    /// Create an empty queue. `name` is used in logs only.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                next_seq: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Queue name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueue an item and wake one blocked taker. Never blocks on capacity.
    pub fn put(&self, item: WorkItem) {
        {
            let mut state = self.state.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            tracing::trace!(queue = self.name, item_id = %item.id(), "enqueue");
            state.heap.push(QueuedItem { item, seq });
        }
        self.available.notify_one();
    }

    /// Block until the highest-priority item is available and remove it.
    ///
    /// Returns `None` once `token` is cancelled, even if items remain queued.
    pub fn take(&self, token: &CancellationToken) -> Option<WorkItem> {
        let mut state = self.state.lock();
        loop {
            // Checked under the lock: `interrupt` takes the same lock before
            // notifying, so a cancel cannot slip between check and wait.
            if token.is_cancelled() {
                return None;
            }
            if let Some(entry) = state.heap.pop() {
                return Some(entry.item);
            }
            self.available.wait(&mut state);
        }
    }

    /// Remove the highest-priority item without blocking.
    pub fn try_take(&self) -> Option<WorkItem> {
        self.state.lock().heap.pop().map(|entry| entry.item)
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an item with `id` is currently queued.
    #[must_use]
    pub fn contains(&self, id: Uuid) -> bool {
        self.state.lock().heap.iter().any(|entry| entry.item.id() == id)
    }

    /// Ids of queued items in dequeue order.
    #[must_use]
    pub fn snapshot_ids(&self) -> Vec<Uuid> {
        let state = self.state.lock();
        let mut entries: Vec<&QueuedItem> = state.heap.iter().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries.iter().map(|entry| entry.item.id()).collect()
    }
}

impl Interruptible for PriorityWorkQueue {
    fn interrupt(&self) {
        let _state = self.state.lock();
        self.available.notify_all();
    }
}

impl std::fmt::Debug for PriorityWorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityWorkQueue")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}
