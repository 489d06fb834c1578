//! Tests for error types

use txn_engine::core::{EngineError, WorkStatus};

#[test]
fn test_invalid_amount_display() {
    let err = EngineError::InvalidAmount(-5.0);
    assert_eq!(format!("{err}"), "invalid amount: -5");
}

#[test]
fn test_invalid_transition_display() {
    let err = EngineError::InvalidTransition {
        from: WorkStatus::Completed,
        to: WorkStatus::Processing,
    };
    assert_eq!(format!("{err}"), "invalid transition: COMPLETED -> PROCESSING");
}

#[test]
fn test_shutdown_display() {
    assert_eq!(format!("{}", EngineError::ShutDown), "engine is shut down");
}

#[test]
fn test_store_helper_wraps_display() {
    let io = std::io::Error::other("disk full");
    let err = EngineError::store(io);
    assert_eq!(format!("{err}"), "store error: disk full");
}

#[test]
fn test_converts_into_anyhow() {
    fn fails() -> txn_engine::core::AppResult<()> {
        Err(EngineError::InvalidConfig("main_workers must be greater than 0".into()))?;
        Ok(())
    }
    let err = fails().unwrap_err();
    assert!(err.to_string().contains("invalid configuration"));
    assert!(err.downcast_ref::<EngineError>().is_some());
}
