//! One processing attempt, from dequeue to a persisted closing state.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;

use tokio::runtime::Runtime;
use tracing::{debug, error, warn};

use super::engine::EngineShared;
use super::error::EngineError;
use super::executor::{AttemptContext, ProcessOutcome, Processor};
use super::item::{WorkItem, WorkStatus, WorkerId};
use super::ports::{Notifier, Store};
use super::retry::{RetryDecision, RetryPolicy};

/// Where an attempt left its item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttemptOutcome {
    /// `COMPLETED` was persisted.
    Completed,
    /// `RETRY` was persisted and the item is on the retry queue.
    Retrying,
    /// `FAILED` was persisted.
    Failed,
    /// The item was not in an enqueueable state and was dropped without an
    /// attempt.
    Discarded,
    /// The store rejected a transition; the item is back on its origin queue
    /// in its pre-attempt state and the worker should back off.
    Deferred,
}

impl AttemptOutcome {
    pub const fn is_deferred(self) -> bool {
        matches!(self, Self::Deferred)
    }
}

/// Item state after `outcome`, computed on a copy so the live item stays in
/// `PROCESSING` until the store accepts the change.
fn closing_state(
    policy: &RetryPolicy,
    item: &WorkItem,
    outcome: ProcessOutcome,
) -> Result<WorkItem, EngineError> {
    let mut next = item.clone();
    if outcome.is_success() {
        next.complete()?;
    } else {
        match policy.decide(item.retry_count()) {
            RetryDecision::Requeue { next_retry_count } => next.schedule_retry(next_retry_count)?,
            RetryDecision::Exhausted => next.fail()?,
        }
    }
    Ok(next)
}

/// Run the processor without letting a panic escape the worker.
fn invoke<P: Processor>(
    processor: &P,
    rt: &Runtime,
    item: &WorkItem,
    ctx: &AttemptContext,
) -> ProcessOutcome {
    match catch_unwind(AssertUnwindSafe(|| rt.block_on(processor.process(item, ctx)))) {
        Ok(outcome) => outcome,
        Err(_) => {
            error!(
                worker = %ctx.worker,
                item_id = %item.id(),
                "processor panicked; counting as failure"
            );
            ProcessOutcome::Failure
        }
    }
}

/// Take `item` through one attempt on `worker`.
///
/// The item leaves this function in exactly one place: terminal and
/// persisted, persisted as `RETRY` and on the retry queue, or reverted and
/// back on the queue it came from. An item that cannot begin an attempt is
/// dropped and released from ownership.
pub(crate) fn run_attempt<S, N, P>(
    shared: &EngineShared<S, N, P>,
    rt: &Runtime,
    worker: WorkerId,
    mut item: WorkItem,
) -> AttemptOutcome
where
    S: Store,
    N: Notifier,
    P: Processor,
{
    let origin_status = item.status();
    let origin_retry_count = item.retry_count();
    let counters = shared.counters(worker.pool);

    if let Err(e) = item.begin_attempt(worker) {
        // Only enqueueable items are put on a queue.
        error!(
            worker = %worker,
            item_id = %item.id(),
            status = %origin_status,
            error = %e,
            "dequeued item cannot be processed; discarding"
        );
        shared.reconciler.forget(item.id());
        return AttemptOutcome::Discarded;
    }
    if let Err(e) = shared.publish(&item) {
        warn!(
            worker = %worker,
            item_id = %item.id(),
            error = %e,
            "could not persist PROCESSING; requeueing"
        );
        return defer(shared, worker, item, origin_status, origin_retry_count);
    }

    counters.active.fetch_add(1, Ordering::Relaxed);
    counters.attempts.fetch_add(1, Ordering::Relaxed);
    let ctx = AttemptContext {
        worker,
        attempt: origin_retry_count.saturating_add(1),
    };
    debug!(
        worker = %worker,
        item_id = %item.id(),
        amount = item.amount(),
        attempt = ctx.attempt,
        "attempt started"
    );

    let outcome = invoke(&shared.processor, rt, &item, &ctx);
    let elapsed = item.end_attempt();
    shared.timings.record(worker, elapsed);
    counters.active.fetch_sub(1, Ordering::Relaxed);

    let persisted = closing_state(&shared.policy, &item, outcome)
        .and_then(|next| shared.publish(&next).map(|()| next));
    let closed = match persisted {
        Ok(next) => next,
        Err(e) if outcome.is_success() => {
            warn!(
                worker = %worker,
                item_id = %item.id(),
                error = %e,
                "could not persist COMPLETED; treating attempt as failed"
            );
            match closing_state(&shared.policy, &item, ProcessOutcome::Failure)
                .and_then(|next| shared.publish(&next).map(|()| next))
            {
                Ok(next) => next,
                Err(e) => {
                    error!(
                        worker = %worker,
                        item_id = %item.id(),
                        error = %e,
                        "could not persist failure either; reverting"
                    );
                    return defer(shared, worker, item, origin_status, origin_retry_count);
                }
            }
        }
        Err(e) => {
            error!(
                worker = %worker,
                item_id = %item.id(),
                error = %e,
                "could not persist attempt result; reverting"
            );
            return defer(shared, worker, item, origin_status, origin_retry_count);
        }
    };

    let id = closed.id();
    match closed.status() {
        WorkStatus::Completed => {
            debug!(worker = %worker, item_id = %id, elapsed_ms = elapsed, "completed");
            counters.completed.fetch_add(1, Ordering::Relaxed);
            shared.reconciler.forget(id);
            AttemptOutcome::Completed
        }
        WorkStatus::Retry => {
            warn!(
                worker = %worker,
                item_id = %id,
                retry_count = closed.retry_count(),
                "attempt failed; scheduled for retry"
            );
            counters.retried.fetch_add(1, Ordering::Relaxed);
            shared.retry_queue.put(closed);
            AttemptOutcome::Retrying
        }
        _ => {
            warn!(
                worker = %worker,
                item_id = %id,
                retry_count = closed.retry_count(),
                "retries exhausted; item failed"
            );
            counters.failed.fetch_add(1, Ordering::Relaxed);
            shared.reconciler.forget(id);
            AttemptOutcome::Failed
        }
    }
}

fn defer<S, N, P>(
    shared: &EngineShared<S, N, P>,
    worker: WorkerId,
    mut item: WorkItem,
    status: WorkStatus,
    retry_count: u32,
) -> AttemptOutcome
where
    S: Store,
    N: Notifier,
    P: Processor,
{
    item.revert_to(status, retry_count);
    shared.counters(worker.pool).deferred.fetch_add(1, Ordering::Relaxed);
    shared.home_queue(status).put(item);
    AttemptOutcome::Deferred
}
