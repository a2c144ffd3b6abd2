//! Offloading blocking work onto a plain OS thread.
//!
//! The scheduler itself is single-threaded: exactly one fiber runs at a
//! time, on the thread driving `Scheduler::run`. Anything that would block
//! that thread — filesystem access, a CPU-bound computation, a call into a
//! blocking library — has to happen somewhere else. `run_in_thread` spawns
//! a plain `std::thread`, lets the fiber suspend on a `Signal` that the
//! worker sets when it finishes, and hands back a `FiberHandle` the rest of
//! the scheduler treats exactly like any other fiber.
//!
//! Cancellation here is cooperative only: a worker thread cannot be forced
//! to stop. `run_in_thread_checked` gives the closure a [`CancelToken`] it
//! can poll; `run_in_thread` does not, and a fiber built on it will simply
//! keep running on its thread (leaking that thread) if the scheduler
//! shuts down while it is still in flight. Either way the *fiber* observes
//! cancellation as soon as its worker finishes or, for the checked variant,
//! as soon as the closure notices and returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::warn;

use crate::error::{Error, Result};
use crate::value::Value;

use super::fiber::{spawn, FiberHandle};
use super::signal::Signal;

/// A cooperative cancellation flag handed to [`run_in_thread_checked`]
/// closures.
#[derive(Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// True once the fiber this work belongs to has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

fn spawn_worker<F>(f: F, signal: Signal, slot: Arc<Mutex<Option<Result<Value>>>>)
where
    F: FnOnce() -> Result<Value> + Send + 'static,
{
    let build = thread::Builder::new().name("fiberloop-worker".into());
    let spawned = build.spawn(move || {
        let result = f();
        *slot.lock().unwrap() = Some(result);
        signal.set();
    });
    if let Err(e) = spawned {
        warn!(error = %e, "failed to spawn fiberloop worker thread");
        *slot.lock().unwrap() = Some(Err(Error::user(e)));
        signal.set();
    }
}

fn bridge(
    signal: Signal,
    slot: Arc<Mutex<Option<Result<Value>>>>,
    worker_cancel: Option<Arc<AtomicBool>>,
) -> FiberHandle {
    spawn(async move {
        let awaited = signal.wait().await;
        if let Err(e) = &awaited {
            if e.is_cancelled() {
                if let Some(flag) = &worker_cancel {
                    flag.store(true, Ordering::Release);
                }
            }
        }
        awaited?;
        slot.lock()
            .unwrap()
            .take()
            .expect("thread bridge signal fired before its result was stored")
    })
}

/// Entry point for offloading blocking work onto a dedicated OS thread.
///
/// A unit struct rather than a module of free functions, so a caller can
/// write `ThreadBridge::run_in_thread(...)` as a pool-free adapter name —
/// `run_in_thread` and `run_in_thread_checked` at the crate root are plain
/// re-exports of these two associated functions.
pub struct ThreadBridge;

impl ThreadBridge {
    /// Run `f` on a dedicated OS thread and resolve to its result.
    ///
    /// `f` cannot observe cancellation; if the scheduler shuts down while it
    /// is still running, the fiber waiting on it is cancelled immediately but
    /// the thread is left to finish on its own.
    pub fn run_in_thread<F>(f: F) -> FiberHandle
    where
        F: FnOnce() -> Result<Value> + Send + 'static,
    {
        let signal = Signal::new();
        let slot = Arc::new(Mutex::new(None));
        spawn_worker(f, signal.clone(), slot.clone());
        bridge(signal, slot, None)
    }

    /// Run `f` on a dedicated OS thread, giving it a [`CancelToken`] it
    /// should poll at safe points and honor by returning early.
    pub fn run_in_thread_checked<F>(f: F) -> FiberHandle
    where
        F: FnOnce(CancelToken) -> Result<Value> + Send + 'static,
    {
        let signal = Signal::new();
        let slot = Arc::new(Mutex::new(None));
        let cancel = Arc::new(AtomicBool::new(false));
        let token = CancelToken(cancel.clone());
        spawn_worker(move || f(token), signal.clone(), slot.clone());
        bridge(signal, slot, Some(cancel))
    }
}

/// Run `f` on a dedicated OS thread and resolve to its result.
///
/// Equivalent to [`ThreadBridge::run_in_thread`].
pub fn run_in_thread<F>(f: F) -> FiberHandle
where
    F: FnOnce() -> Result<Value> + Send + 'static,
{
    ThreadBridge::run_in_thread(f)
}

/// Run `f` on a dedicated OS thread, giving it a [`CancelToken`] it should
/// poll at safe points and honor by returning early.
///
/// Equivalent to [`ThreadBridge::run_in_thread_checked`].
pub fn run_in_thread_checked<F>(f: F) -> FiberHandle
where
    F: FnOnce(CancelToken) -> Result<Value> + Send + 'static,
{
    ThreadBridge::run_in_thread_checked(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_starts_uncancelled() {
        let token = CancelToken(Arc::new(AtomicBool::new(false)));
        assert!(!token.is_cancelled());
    }
}
