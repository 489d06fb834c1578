//! Worker threads for the native target.
//!
//! Each worker is a named OS thread with its own single-threaded tokio
//! runtime, so a slow or blocking processor only ever holds up the worker
//! that called it.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use tracing::{debug, error};

use crate::core::attempt::run_attempt;
use crate::core::engine::EngineShared;
use crate::core::error::EngineError;
use crate::core::executor::Processor;
use crate::core::item::{PoolKind, WorkerId};
use crate::core::ports::{Notifier, Store};

/// Reports the worker as finished however its thread ends, panics included.
struct ExitSignal {
    worker: WorkerId,
    done: Sender<WorkerId>,
}

impl Drop for ExitSignal {
    fn drop(&mut self) {
        let _ = self.done.send(self.worker);
    }
}

/// Spawn one worker thread.
pub(super) fn spawn_worker<S, N, P>(
    worker: WorkerId,
    shared: Arc<EngineShared<S, N, P>>,
    done: Sender<WorkerId>,
) -> Result<JoinHandle<()>, EngineError>
where
    S: Store,
    N: Notifier,
    P: Processor,
{
    thread::Builder::new()
        .name(format!("txn-{worker}"))
        .stack_size(shared.config.thread_stack_size)
        .spawn(move || {
            let _exit = ExitSignal { worker, done };
            debug!(worker = %worker, "worker thread started");

            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!(worker = %worker, error = %e, "failed to create worker runtime");
                    return;
                }
            };

            worker_loop(&shared, &rt, worker);
            debug!(worker = %worker, "worker thread exiting");
        })
        .map_err(|e| EngineError::Spawn(format!("{worker}: {e}")))
}

fn worker_loop<S, N, P>(
    shared: &EngineShared<S, N, P>,
    rt: &tokio::runtime::Runtime,
    worker: WorkerId,
) where
    S: Store,
    N: Notifier,
    P: Processor,
{
    let queue = shared.queue(worker.pool);
    while !shared.token.is_cancelled() {
        // Blocks without polling; returns None once the token fires.
        let Some(item) = queue.take(&shared.token) else {
            break;
        };

        if worker.pool == PoolKind::Retry && shared.token.sleep(shared.policy.delay()) {
            debug!(
                worker = %worker,
                item_id = %item.id(),
                "shutdown during retry delay; item left queued"
            );
            queue.put(item);
            break;
        }

        if run_attempt(shared, rt, worker, item).is_deferred()
            && shared.token.sleep(shared.config.store_error_backoff())
        {
            break;
        }
    }
}
