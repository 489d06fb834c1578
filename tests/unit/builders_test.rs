//! Tests for the engine builder

use std::sync::Arc;

use txn_engine::builders::EngineBuilder;
use txn_engine::config::EngineConfig;
use txn_engine::core::{processor_fn, EngineError, ProcessOutcome, Processor};
use txn_engine::infra::{InMemoryStore, RecordingNotifier};

fn succeed() -> impl Processor {
    processor_fn(|_, _| ProcessOutcome::Success)
}

#[test]
fn test_builder_defaults() {
    let builder = EngineBuilder::new(InMemoryStore::new(), succeed());
    assert_eq!(builder.config(), &EngineConfig::default());
}

#[test]
fn test_builder_rejects_invalid_config() {
    let result = EngineBuilder::new(InMemoryStore::new(), succeed())
        .with_config(EngineConfig::new().with_main_workers(0))
        .start();
    assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
}

#[test]
fn test_builder_wires_notifier() {
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = EngineBuilder::new(InMemoryStore::new(), succeed())
        .with_config(EngineConfig::new().with_main_workers(1).with_retry_workers(1))
        .with_notifier(Arc::clone(&notifier))
        .start()
        .unwrap();

    let item = engine.submit(42.0).unwrap();
    let report = engine.shutdown();

    assert_eq!(notifier.created_count(), 1);
    assert!(!notifier.events().is_empty());
    assert!(engine.store().get(item.id()).is_some());
    assert!(report.store_closed);
}
