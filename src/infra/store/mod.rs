//! Store backends.

pub mod file;
pub mod memory;

pub use file::JsonlStore;
pub use memory::InMemoryStore;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{EngineError, WorkItem, WorkStatus};

/// The persisted subset of a work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Item identifier.
    pub id: Uuid,
    /// Transaction amount.
    pub amount: f64,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at_ms: u128,
    /// Last persisted status.
    pub status: WorkStatus,
    /// Last persisted retry count.
    pub retry_count: u32,
}

impl From<&WorkItem> for StoredRecord {
    fn from(item: &WorkItem) -> Self {
        Self {
            id: item.id(),
            amount: item.amount(),
            created_at_ms: item.created_at_ms(),
            status: item.status(),
            retry_count: item.retry_count(),
        }
    }
}

impl StoredRecord {
    /// Rebuild a work item from this record.
    ///
    /// # Errors
    ///
    /// `EngineError::InvalidAmount` if the stored amount is not usable.
    pub fn to_item(&self) -> Result<WorkItem, EngineError> {
        WorkItem::restore(self.id, self.amount, self.created_at_ms, self.status, self.retry_count)
    }
}
