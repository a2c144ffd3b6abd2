//! A thread-safe, level-triggered wake source.
//!
//! `Signal` is the scheduler's primitive for "something happened, wake
//! whoever is waiting": it can be set from a thread-offloaded worker (see
//! `thread_bridge`) just as easily as from another fiber. `wait()` mints a
//! single-use [`WaitToken`] rather than being directly awaitable, because a
//! token can appear inside an ordered sequence alongside fiber handles
//! (`Dependency::Sequence`), and each token may only ever be yielded once —
//! yielding the same token a second time is a programming error the
//! scheduler rejects rather than silently double-counting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::waiter::Waiter;

struct SignalInner {
    set: AtomicBool,
    waiters: Mutex<Vec<Arc<Waiter>>>,
}

/// A boolean wake source any number of fibers (or threads) can wait on.
///
/// Setting a signal that is already set is a no-op; clearing an unset
/// signal is likewise a no-op. Waiters registered before a `set()` are all
/// released by that call; fibers that ask to wait afterwards observe the
/// signal as already set and resume without blocking.
#[derive(Clone)]
pub struct Signal(Arc<SignalInner>);

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal {
    /// Create a new, initially unset signal.
    pub fn new() -> Self {
        Signal(Arc::new(SignalInner {
            set: AtomicBool::new(false),
            waiters: Mutex::new(Vec::new()),
        }))
    }

    /// Is the signal currently set?
    pub fn is_set(&self) -> bool {
        self.0.set.load(Ordering::Acquire)
    }

    /// Set the signal, releasing every fiber currently waiting on it.
    pub fn set(&self) {
        let mut waiters = self.0.waiters.lock().unwrap();
        if self.0.set.swap(true, Ordering::AcqRel) {
            return;
        }
        let drained = std::mem::take(&mut *waiters);
        drop(waiters);
        for waiter in drained {
            waiter.decrement();
        }
    }

    /// Clear the signal. Fibers that already observed it as set are not
    /// affected; only future `wait()` calls see the cleared state.
    pub fn clear(&self) {
        self.0.set.store(false, Ordering::Release);
    }

    /// Mint a single-use token representing "wait for this signal".
    ///
    /// Use this form when the wait needs to sit alongside other
    /// dependencies inside one ordered sequence (see `join_sequence`).
    /// Yielding the same token twice is an error; call `wait_token()` again
    /// to get a fresh one.
    pub fn wait_token(&self) -> WaitToken {
        WaitToken {
            signal: self.clone(),
            consumed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Suspend the current fiber until this signal is set.
    pub fn wait(&self) -> super::dependency::DependencyFuture {
        super::dependency::yield_dependency(super::types::Dependency::Single(
            super::types::SingleDependency::SignalWait(self.wait_token()),
        ))
    }

    /// Register a waiter; returns `false` if the signal was already set, in
    /// which case the caller should resolve the dependency immediately
    /// instead of waiting for a wake that will never come.
    pub(crate) fn register(&self, waiter: Arc<Waiter>) -> bool {
        let mut waiters = self.0.waiters.lock().unwrap();
        if self.0.set.load(Ordering::Acquire) {
            return false;
        }
        waiters.push(waiter);
        true
    }
}

/// A single-use handle to a pending `Signal::wait()` call.
///
/// Cloning a token does not mint a new wait; both clones share the same
/// "has this been yielded yet" flag, so yielding a clone of an
/// already-yielded token is still rejected as a duplicate.
#[derive(Clone)]
pub struct WaitToken {
    pub(crate) signal: Signal,
    pub(crate) consumed: Arc<AtomicBool>,
}

impl WaitToken {
    /// Mark this token as consumed, returning `true` if it had not already
    /// been used.
    pub(crate) fn mark_consumed(&self) -> bool {
        !self.consumed.swap(true, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_before_register_is_observed_immediately() {
        let signal = Signal::new();
        signal.set();
        assert!(signal.is_set());
        let token = signal.wait_token();
        assert!(token.mark_consumed());
    }

    #[test]
    fn clear_then_set_again() {
        let signal = Signal::new();
        signal.set();
        signal.clear();
        assert!(!signal.is_set());
        signal.set();
        assert!(signal.is_set());
    }

    #[test]
    fn wait_token_consumed_once() {
        let signal = Signal::new();
        let token = signal.wait_token();
        assert!(token.mark_consumed());
        assert!(!token.mark_consumed());
        let clone = token.clone();
        assert!(!clone.mark_consumed());
    }

    #[test]
    fn double_set_is_idempotent() {
        let signal = Signal::new();
        signal.set();
        signal.set();
        assert!(signal.is_set());
    }
}
