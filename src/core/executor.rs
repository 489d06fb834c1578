//! The injected processing operation.

use async_trait::async_trait;

use super::item::{WorkItem, WorkerId};

/// Result of one processing attempt. The engine looks at nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The work succeeded; the item completes.
    Success,
    /// The work failed; the retry policy decides what happens next.
    Failure,
}

impl ProcessOutcome {
    /// Whether this is `Success`.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<bool> for ProcessOutcome {
    fn from(ok: bool) -> Self {
        if ok {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// Who is running an attempt, and which attempt it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptContext {
    /// Worker running the attempt.
    pub worker: WorkerId,
    /// 1 for the first attempt, `retry_count + 1` afterwards.
    pub attempt: u32,
}

/// Business logic deciding whether a work item succeeds.
///
/// On native platforms each worker owns a single-threaded tokio runtime and
/// blocks on this future, so an implementation may await timers or I/O, or
/// simply block; either way only the calling worker is held up.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use txn_engine::core::{AttemptContext, ProcessOutcome, Processor, WorkItem};
///
/// struct LedgerPoster;
///
/// #[async_trait]
/// impl Processor for LedgerPoster {
///     async fn process(&self, item: &WorkItem, _ctx: &AttemptContext) -> ProcessOutcome {
///         post_to_ledger(item.id(), item.amount()).await.is_ok().into()
///     }
/// }
/// ```
#[async_trait]
pub trait Processor: Send + Sync + 'static {
    /// Run one attempt on `item`.
    async fn process(&self, item: &WorkItem, ctx: &AttemptContext) -> ProcessOutcome;
}

/// Adapter turning a plain closure into a `Processor`.
pub struct FnProcessor<F> {
    f: F,
}

/// Wrap a synchronous closure as a `Processor`.
///
/// ```rust,ignore
/// let processor = processor_fn(|item, _ctx| (item.amount() < 10_000.0).into());
/// ```
pub fn processor_fn<F>(f: F) -> FnProcessor<F>
where
    F: Fn(&WorkItem, &AttemptContext) -> ProcessOutcome + Send + Sync + 'static,
{
    FnProcessor { f }
}

#[async_trait]
impl<F> Processor for FnProcessor<F>
where
    F: Fn(&WorkItem, &AttemptContext) -> ProcessOutcome + Send + Sync + 'static,
{
    async fn process(&self, item: &WorkItem, ctx: &AttemptContext) -> ProcessOutcome {
        (self.f)(item, ctx)
    }
}
