//! Error types for engine operations.

use thiserror::Error;

use super::item::WorkStatus;

/// Errors produced by engine components and the ports they call.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Amount was zero, negative, or not finite.
    #[error("invalid amount: {0}")]
    InvalidAmount(f64),
    /// A status change the state machine does not allow.
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Status the item was in.
        from: WorkStatus,
        /// Status that was requested.
        to: WorkStatus,
    },
    /// The engine is shutting down and accepts no more work.
    #[error("engine is shut down")]
    ShutDown,
    /// Persistence backend failure with context.
    #[error("store error: {0}")]
    Store(String),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A worker thread could not be started.
    #[error("failed to spawn worker: {0}")]
    Spawn(String),
}

impl EngineError {
    /// Build a store error from anything displayable.
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(err.to_string())
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
