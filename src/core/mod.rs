//! Scheduling core: work items, queues, retry policy, worker pools and the engine.

pub mod cancel;
pub mod engine;
pub mod error;
pub mod executor;
pub mod item;
pub mod ports;
pub mod queue;
pub mod recovery;
pub mod retry;
pub mod stats;

mod attempt;
mod worker_pool;

pub use cancel::{CancellationToken, Interruptible};
pub use engine::{Engine, ShutdownReport};
pub use error::{AppResult, EngineError};
pub use executor::{processor_fn, AttemptContext, FnProcessor, ProcessOutcome, Processor};
pub use item::{PoolKind, WorkItem, WorkStatus, WorkerId};
pub use ports::{Notifier, Store};
pub use queue::PriorityWorkQueue;
pub use recovery::{RecoveryReconciler, RecoveryReport};
pub use retry::{RetryDecision, RetryPolicy};
pub use stats::{EngineStats, PoolStats, TimingAggregator};
