//! File-backed store: durability, replay and compaction.

use std::fs;

use uuid::Uuid;

use txn_engine::core::{EngineError, Store, WorkItem, WorkStatus};
use txn_engine::infra::{InMemoryStore, JsonlStore, StoredRecord};

fn item(amount: f64) -> WorkItem {
    WorkItem::with_id(Uuid::new_v4(), amount).unwrap()
}

fn with_status(source: &WorkItem, status: WorkStatus, retry_count: u32) -> WorkItem {
    WorkItem::restore(
        source.id(),
        source.amount(),
        source.created_at_ms(),
        status,
        retry_count,
    )
    .unwrap()
}

#[test]
fn test_replay_keeps_last_write() {
    let dir = tempfile::tempdir().unwrap();
    let a = item(10.0);
    let b = item(20.0);
    {
        let store = JsonlStore::open(dir.path(), "txns").unwrap();
        store.save(&a).unwrap();
        store.save(&b).unwrap();
        store.update_status(&with_status(&a, WorkStatus::Processing, 0)).unwrap();
        store.update_status(&with_status(&a, WorkStatus::Retry, 1)).unwrap();
        store.update_status(&with_status(&b, WorkStatus::Processing, 0)).unwrap();
        store.update_status(&with_status(&b, WorkStatus::Completed, 0)).unwrap();
        assert_eq!(store.appended_since_compact(), 6);
        // Dropped without close: the raw log must be enough.
    }

    let reopened = JsonlStore::open(dir.path(), "txns").unwrap();
    let ra = reopened.get(a.id()).unwrap();
    assert_eq!((ra.status, ra.retry_count), (WorkStatus::Retry, 1));
    assert_eq!(reopened.get(b.id()).unwrap().status, WorkStatus::Completed);

    let pending = reopened.recover_pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id(), a.id());
    assert_eq!(pending[0].created_at_ms(), a.created_at_ms());
}

#[test]
fn test_compact_rewrites_one_line_per_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::open(dir.path(), "txns").unwrap();
    let a = item(10.0);
    store.save(&a).unwrap();
    for n in 1..=3 {
        store.update_status(&with_status(&a, WorkStatus::Retry, n)).unwrap();
    }
    store.save(&item(5.0)).unwrap();

    store.compact().unwrap();

    assert_eq!(store.appended_since_compact(), 0);
    let contents = fs::read_to_string(dir.path().join("txns.jsonl")).unwrap();
    assert_eq!(contents.lines().count(), 2);
    assert_eq!(store.get(a.id()).unwrap().retry_count, 3);

    // Appends continue after compaction.
    store.update_status(&with_status(&a, WorkStatus::Failed, 3)).unwrap();
    let reopened = JsonlStore::open(dir.path(), "txns").unwrap();
    assert_eq!(reopened.get(a.id()).unwrap().status, WorkStatus::Failed);
}

#[test]
fn test_closed_store_rejects_writes() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::open(dir.path(), "txns").unwrap();
    let a = item(10.0);
    store.save(&a).unwrap();

    store.close().unwrap();
    store.close().unwrap();

    assert!(store.is_closed());
    assert!(matches!(store.save(&item(1.0)), Err(EngineError::Store(_))));
    assert!(matches!(
        store.update_status(&with_status(&a, WorkStatus::Processing, 0)),
        Err(EngineError::Store(_))
    ));
    assert!(store.compact().is_err());
    assert!(store.get(a.id()).is_some());
}

#[test]
fn test_duplicate_and_unknown_ids_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::open(dir.path(), "txns").unwrap();
    let a = item(10.0);
    store.save(&a).unwrap();

    assert!(store.save(&a).is_err());
    assert!(store.update_status(&item(3.0)).is_err());
    assert_eq!(store.records().len(), 1);
}

#[test]
fn test_malformed_line_reports_position() {
    let dir = tempfile::tempdir().unwrap();
    let a = item(10.0);
    let line = serde_json::to_string(&StoredRecord::from(&a)).unwrap();
    fs::write(dir.path().join("txns.jsonl"), format!("{line}\n\n{{not json\n")).unwrap();

    let err = JsonlStore::open(dir.path(), "txns").unwrap_err();
    assert!(err.to_string().contains("line 3"), "{err}");
}

#[test]
fn test_streams_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let left = JsonlStore::open(dir.path(), "left").unwrap();
    let right = JsonlStore::open(dir.path(), "right").unwrap();
    let a = item(10.0);
    left.save(&a).unwrap();

    assert!(left.get(a.id()).is_some());
    assert!(right.get(a.id()).is_none());
}

#[test]
fn test_memory_store_matches_file_store_semantics() {
    let store = InMemoryStore::new();
    let a = item(10.0);
    store.save(&a).unwrap();
    store.update_status(&with_status(&a, WorkStatus::Completed, 0)).unwrap();

    assert!(store.recover_pending().unwrap().is_empty());
    assert!(store.save(&a).is_err());
    assert!(store.update_status(&item(1.0)).is_err());
    assert!(store.close().is_ok());
}
