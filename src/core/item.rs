//! The schedulable unit of work and its lifecycle.

use std::cmp::Ordering;
use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::EngineError;
use crate::util::clock::{elapsed_ms, now_ms};

/// Lifecycle status of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkStatus {
    /// Freshly submitted, waiting on the main queue.
    New,
    /// Held by a worker for an attempt.
    Processing,
    /// Processing succeeded. Terminal.
    Completed,
    /// Retries exhausted. Terminal.
    Failed,
    /// Waiting on the retry queue for another attempt.
    Retry,
}

impl WorkStatus {
    /// Canonical upper-case name, as persisted.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Retry => "RETRY",
        }
    }

    /// `COMPLETED` and `FAILED` never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Only `NEW` and `RETRY` items may sit in a queue.
    #[must_use]
    pub const fn is_enqueueable(self) -> bool {
        matches!(self, Self::New | Self::Retry)
    }

    /// Statuses a store hands back on startup.
    #[must_use]
    pub const fn is_recoverable(self) -> bool {
        matches!(self, Self::New | Self::Processing | Self::Retry)
    }

    /// Whether the state machine permits `self -> to`.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::New | Self::Retry, Self::Processing)
                | (Self::Processing, Self::Completed | Self::Retry | Self::Failed)
        )
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the two pools a worker belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    /// Drains the main queue.
    Main,
    /// Drains the retry queue after the retry delay.
    Retry,
}

impl PoolKind {
    /// Short lowercase label used in worker ids and thread names.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Retry => "retry",
        }
    }
}

/// Identity of a worker, assigned when its pool is built.
///
/// Indices are 1-based, so the first main worker displays as `main-1`.
/// Serializes as that display string so it can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct WorkerId {
    /// Owning pool.
    pub pool: PoolKind,
    /// Position within the pool, starting at 1.
    pub index: usize,
}

impl WorkerId {
    /// Create a worker id.
    #[must_use]
    pub const fn new(pool: PoolKind, index: usize) -> Self {
        Self { pool, index }
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.pool.label(), self.index)
    }
}

impl From<WorkerId> for String {
    fn from(id: WorkerId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for WorkerId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (label, index) = value
            .rsplit_once('-')
            .ok_or_else(|| format!("malformed worker id `{value}`"))?;
        let pool = match label {
            "main" => PoolKind::Main,
            "retry" => PoolKind::Retry,
            other => return Err(format!("unknown pool `{other}`")),
        };
        let index = index
            .parse()
            .map_err(|e| format!("bad worker index in `{value}`: {e}"))?;
        Ok(Self { pool, index })
    }
}

/// A transaction moving through the engine.
///
/// Status and counters change only through the crate-internal transition
/// methods, which enforce the state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    id: Uuid,
    amount: f64,
    created_at_ms: u128,
    status: WorkStatus,
    retry_count: u32,
    processing_time_ms: u64,
    #[serde(skip)]
    processing_started_at: Option<Instant>,
    processing_worker: Option<WorkerId>,
}

fn validate_amount(amount: f64) -> Result<f64, EngineError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(EngineError::InvalidAmount(amount))
    }
}

impl WorkItem {
    /// Create a `NEW` item with a generated id.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidAmount` unless `amount` is positive and finite.
    pub fn new(amount: f64) -> Result<Self, EngineError> {
        Self::with_id(Uuid::new_v4(), amount)
    }

    /// Create a `NEW` item with a caller-supplied id.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidAmount` unless `amount` is positive and finite.
    pub fn with_id(id: Uuid, amount: f64) -> Result<Self, EngineError> {
        Self::restore(id, amount, now_ms(), WorkStatus::New, 0)
    }

    /// Rebuild an item from persisted fields.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidAmount` unless `amount` is positive and finite.
    pub fn restore(
        id: Uuid,
        amount: f64,
        created_at_ms: u128,
        status: WorkStatus,
        retry_count: u32,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            id,
            amount: validate_amount(amount)?,
            created_at_ms,
            status,
            retry_count,
            processing_time_ms: 0,
            processing_started_at: None,
            processing_worker: None,
        })
    }

    /// Unique identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Transaction amount.
    #[must_use]
    pub const fn amount(&self) -> f64 {
        self.amount
    }

    /// Creation time in milliseconds since the Unix epoch.
    #[must_use]
    pub const fn created_at_ms(&self) -> u128 {
        self.created_at_ms
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> WorkStatus {
        self.status
    }

    /// Number of retries consumed so far.
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Cumulative processing time, including a running attempt.
    #[must_use]
    pub fn processing_time_ms(&self) -> u64 {
        self.processing_started_at
            .map_or(self.processing_time_ms, |started| {
                self.processing_time_ms.saturating_add(elapsed_ms(started))
            })
    }

    /// Worker currently or most recently processing this item.
    #[must_use]
    pub const fn processing_worker(&self) -> Option<WorkerId> {
        self.processing_worker
    }

    /// Whether an attempt is running.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        self.processing_started_at.is_some()
    }

    /// Queue ordering: `Greater` means `self` is dequeued first.
    ///
    /// Larger amounts win; equal amounts fall back to the older item.
    #[must_use]
    pub fn priority_cmp(&self, other: &Self) -> Ordering {
        self.amount
            .total_cmp(&other.amount)
            .then_with(|| other.created_at_ms.cmp(&self.created_at_ms))
    }

    fn transition(&mut self, to: WorkStatus) -> Result<(), EngineError> {
        if !self.status.can_transition_to(to) {
            return Err(EngineError::InvalidTransition { from: self.status, to });
        }
        self.status = to;
        Ok(())
    }

    /// `NEW|RETRY -> PROCESSING`, recording the start instant and owner.
    pub(crate) fn begin_attempt(&mut self, worker: WorkerId) -> Result<(), EngineError> {
        self.transition(WorkStatus::Processing)?;
        self.processing_started_at = Some(Instant::now());
        self.processing_worker = Some(worker);
        Ok(())
    }

    /// Fold the running attempt into the accumulator and return its duration.
    pub(crate) fn end_attempt(&mut self) -> u64 {
        let Some(started) = self.processing_started_at.take() else {
            return 0;
        };
        let elapsed = elapsed_ms(started);
        self.processing_time_ms = self.processing_time_ms.saturating_add(elapsed);
        elapsed
    }

    pub(crate) fn complete(&mut self) -> Result<(), EngineError> {
        self.transition(WorkStatus::Completed)
    }

    pub(crate) fn schedule_retry(&mut self, next_retry_count: u32) -> Result<(), EngineError> {
        if next_retry_count <= self.retry_count {
            return Err(EngineError::InvalidTransition {
                from: self.status,
                to: WorkStatus::Retry,
            });
        }
        self.transition(WorkStatus::Retry)?;
        self.retry_count = next_retry_count;
        Ok(())
    }

    pub(crate) fn fail(&mut self) -> Result<(), EngineError> {
        self.transition(WorkStatus::Failed)
    }

    /// Put the item back into an enqueueable state after an attempt whose
    /// transitions could not be persisted. Accumulated time is kept.
    pub(crate) fn revert_to(&mut self, status: WorkStatus, retry_count: u32) {
        debug_assert!(status.is_enqueueable());
        self.end_attempt();
        self.status = status;
        self.retry_count = retry_count;
    }

    /// Normalize a recovered item. `PROCESSING` becomes `NEW` because its
    /// attempt died with the previous process. Returns whether the status changed.
    pub(crate) fn reset_for_recovery(&mut self) -> bool {
        self.processing_started_at = None;
        if self.status == WorkStatus::Processing {
            self.status = WorkStatus::New;
            true
        } else {
            false
        }
    }
}
