//! Fixed-size pools of worker threads bound to one queue each.
//!
//! A pool is spawned once at engine start and drained once at shutdown.
//! Workers stop on their own when the engine's cancellation token fires;
//! `join_until` only waits for them, up to a deadline, and detaches whatever
//! is still running an attempt.

mod native;

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver};
use tracing::{debug, info, warn};

use super::engine::EngineShared;
use super::error::EngineError;
use super::executor::Processor;
use super::item::{PoolKind, WorkerId};
use super::ports::{Notifier, Store};

/// Outcome of joining one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PoolJoin {
    pub joined: usize,
    pub detached: usize,
}

/// Handles to a running pool's threads.
pub(crate) struct WorkerPool {
    kind: PoolKind,
    workers: Vec<(WorkerId, JoinHandle<()>)>,
    done_rx: Receiver<WorkerId>,
}

impl WorkerPool {
    /// Spawn `count` workers serving `kind`'s queue.
    ///
    /// # Errors
    ///
    /// `EngineError::Spawn` if the OS refuses a thread. Workers spawned
    /// before the failure keep running until the token is cancelled.
    pub fn spawn<S, N, P>(
        kind: PoolKind,
        count: usize,
        shared: &Arc<EngineShared<S, N, P>>,
    ) -> Result<Self, EngineError>
    where
        S: Store,
        N: Notifier,
        P: Processor,
    {
        let (done_tx, done_rx) = unbounded();
        let mut workers = Vec::with_capacity(count);
        for index in 1..=count {
            let worker = WorkerId::new(kind, index);
            let handle = native::spawn_worker(worker, Arc::clone(shared), done_tx.clone())?;
            workers.push((worker, handle));
        }
        info!(pool = kind.label(), worker_count = count, "worker pool started");
        Ok(Self {
            kind,
            workers,
            done_rx,
        })
    }

    /// Number of workers in the pool.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Wait until `deadline` for every worker to exit; detach the rest.
    ///
    /// Call only after the token is cancelled.
    pub fn join_until(mut self, deadline: Instant) -> PoolJoin {
        let mut report = PoolJoin::default();
        let mut pending = self.workers.len();
        while pending > 0 {
            match self.done_rx.recv_deadline(deadline) {
                Ok(worker) => {
                    pending -= 1;
                    let Some(pos) = self.workers.iter().position(|(id, _)| *id == worker) else {
                        continue;
                    };
                    let (_, handle) = self.workers.swap_remove(pos);
                    if handle.join().is_err() {
                        warn!(worker = %worker, "worker panicked");
                    } else {
                        debug!(worker = %worker, "worker joined");
                    }
                    report.joined += 1;
                }
                Err(_) => break,
            }
        }

        for (worker, _handle) in self.workers.drain(..) {
            warn!(worker = %worker, "worker did not exit within grace period - detaching");
            report.detached += 1;
        }

        info!(
            pool = self.kind.label(),
            joined = report.joined,
            detached = report.detached,
            "worker pool stopped"
        );
        report
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("kind", &self.kind)
            .field("workers", &self.len())
            .finish()
    }
}
