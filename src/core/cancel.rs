//! Cooperative cancellation for blocked workers.
//!
//! A `CancellationToken` is shared by every worker and queue of an engine.
//! Cancelling it wakes all registered queues so that blocked `take` calls
//! return, and wakes any worker sleeping out the retry delay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Something that parks threads and must wake them on cancellation.
pub trait Interruptible: Send + Sync {
    /// Wake every thread currently parked on this object.
    fn interrupt(&self);
}

struct TokenInner {
    cancelled: AtomicBool,
    /// Guards the sleep condvar; holds nothing of its own.
    sleep_lock: Mutex<()>,
    sleep_cv: Condvar,
    registered: Mutex<Vec<Weak<dyn Interruptible>>>,
}

/// Shared cancellation flag with wake-up support.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancellationToken {
    /// Create a live token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                sleep_lock: Mutex::new(()),
                sleep_cv: Condvar::new(),
                registered: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Whether `cancel` has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Register an object to interrupt on cancellation.
    ///
    /// Registering on an already-cancelled token interrupts immediately.
    pub fn register<I>(&self, target: &Arc<I>)
    where
        I: Interruptible + 'static,
    {
        let as_dyn: Arc<dyn Interruptible> = target.clone();
        {
            let mut registered = self.inner.registered.lock();
            registered.retain(|w| w.strong_count() > 0);
            registered.push(Arc::downgrade(&as_dyn));
        }
        if self.is_cancelled() {
            target.interrupt();
        }
    }

    /// Cancel the token and wake everything waiting on it.
    ///
    /// Returns `false` if it was already cancelled.
    pub fn cancel(&self) -> bool {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        {
            let _guard = self.inner.sleep_lock.lock();
            self.inner.sleep_cv.notify_all();
        }
        let targets: Vec<_> = self
            .inner
            .registered
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for target in targets {
            target.interrupt();
        }
        true
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` if the sleep was cut short by cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut guard = self.inner.sleep_lock.lock();
        loop {
            if self.is_cancelled() {
                return true;
            }
            if self.inner.sleep_cv.wait_until(&mut guard, deadline).timed_out() {
                return self.is_cancelled();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    struct Counter(AtomicUsize);

    impl Interruptible for Counter {
        fn interrupt(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancel_interrupts_registered() {
        let token = CancellationToken::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        token.register(&counter);
        token.cancel();
        token.cancel();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_register_after_cancel_interrupts_now() {
        let token = CancellationToken::new();
        token.cancel();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        token.register(&counter);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sleep_runs_full_duration() {
        let token = CancellationToken::new();
        let start = Instant::now();
        assert!(!token.sleep(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_sleep_cut_short_by_cancel() {
        let token = CancellationToken::new();
        let sleeper = token.clone();
        let start = Instant::now();
        let handle = thread::spawn(move || sleeper.sleep(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert!(handle.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
