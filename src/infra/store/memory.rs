//! In-memory store for development and testing.

use std::collections::HashMap;

use parking_lot::RwLock;
use uuid::Uuid;

use super::StoredRecord;
use crate::core::{EngineError, Store, WorkItem};

/// Store that keeps records in a map. Nothing survives the process, but a
/// single instance can be handed to successive engines to exercise recovery.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<Uuid, StoredRecord>>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with records, as if left behind by an earlier run.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = StoredRecord>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().map(|r| (r.id, r)).collect()),
        }
    }

    /// Fetch one record.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<StoredRecord> {
        self.records.read().get(&id).cloned()
    }

    /// All records, in no particular order.
    #[must_use]
    pub fn records(&self) -> Vec<StoredRecord> {
        self.records.read().values().cloned().collect()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for InMemoryStore {
    fn recover_pending(&self) -> Result<Vec<WorkItem>, EngineError> {
        self.records
            .read()
            .values()
            .filter(|r| r.status.is_recoverable())
            .map(StoredRecord::to_item)
            .collect()
    }

    fn save(&self, item: &WorkItem) -> Result<(), EngineError> {
        let mut records = self.records.write();
        if records.contains_key(&item.id()) {
            return Err(EngineError::Store(format!("duplicate id {}", item.id())));
        }
        records.insert(item.id(), StoredRecord::from(item));
        Ok(())
    }

    fn update_status(&self, item: &WorkItem) -> Result<(), EngineError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(&item.id())
            .ok_or_else(|| EngineError::Store(format!("unknown id {}", item.id())))?;
        record.status = item.status();
        record.retry_count = item.retry_count();
        Ok(())
    }
}
