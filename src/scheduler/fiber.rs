//! Fiber handles: the user-facing identity of a unit of work.
//!
//! A `FiberHandle` is cheap to clone and can be yielded as a dependency from
//! any number of places before or after it has been admitted to a
//! scheduler. The first time the scheduler sees a given handle it takes
//! ownership of the boxed future and assigns it a `FiberId`; every later
//! sighting of a clone of that same handle resolves to the same fiber
//! instead of starting a second, independent copy of the work.
//!
//! The completed result is cached directly inside the handle's shared cell
//! rather than in a scheduler-wide table. This gives memoization across
//! repeated `Scheduler::run` calls on the same handle for free, and the
//! cached `Value` is dropped exactly when the last clone of the handle is,
//! which is the closest a `Hash`-free identity like this can get to the
//! weak-reference result cache of the system it is modeled on.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::value::Value;

use super::types::FiberId;

pub(crate) type BoxedFiber = Pin<Box<dyn Future<Output = Result<Value>>>>;

pub(crate) enum FiberCell {
    /// Not yet seen by any scheduler; holds the body, ready to be taken.
    Unadmitted(Option<BoxedFiber>),
    /// Currently known to a scheduler under this id, still running.
    Admitted(FiberId),
    /// Finished, successfully or not. Cached for the life of the handle.
    Done(Result<Value>),
}

/// A reference to a unit of cooperatively scheduled work.
///
/// Construct one with [`spawn`] from any future whose output is
/// `Result<Value, Error>`, then yield it (directly, in a sequence, or in a
/// background set) from within another fiber, or hand it to
/// [`crate::Scheduler::run`] as the root.
#[derive(Clone)]
pub struct FiberHandle(pub(crate) Arc<Mutex<FiberCell>>);

impl fmt::Debug for FiberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.0.lock().unwrap() {
            FiberCell::Unadmitted(_) => "unadmitted",
            FiberCell::Admitted(id) => return write!(f, "FiberHandle({id})"),
            FiberCell::Done(Ok(_)) => "done(ok)",
            FiberCell::Done(Err(_)) => "done(err)",
        };
        write!(f, "FiberHandle({state})")
    }
}

impl FiberHandle {
    /// Observably-known outcome of a fiber, for callers that want to peek
    /// without awaiting it.
    pub fn state(&self) -> FiberState {
        match &*self.0.lock().unwrap() {
            FiberCell::Unadmitted(_) => FiberState::NotStarted,
            FiberCell::Admitted(_) => FiberState::Running,
            FiberCell::Done(Ok(v)) => FiberState::Finished(v.clone()),
            FiberCell::Done(Err(e)) if e.is_cancelled() => FiberState::Cancelled,
            FiberCell::Done(Err(e)) => FiberState::Failed(e.clone()),
        }
    }

    /// Wait for this fiber to finish, admitting it if it is fresh.
    ///
    /// Equivalent to yielding this handle on its own, but usable as a plain
    /// `.await` expression from within a fiber body.
    pub fn join(&self) -> super::dependency::DependencyFuture {
        super::dependency::yield_dependency(super::types::Dependency::Single(
            super::types::SingleDependency::Fiber(self.clone()),
        ))
    }
}

/// A snapshot of what is known about a fiber at the moment it is inspected.
#[derive(Debug, Clone)]
pub enum FiberState {
    /// Never admitted to any scheduler.
    NotStarted,
    /// Admitted and not yet finished.
    Running,
    /// Returned a value.
    Finished(Value),
    /// Cancelled as part of a shutdown.
    Cancelled,
    /// Returned an error other than cancellation.
    Failed(Error),
}

/// Wrap a future as a fresh, unadmitted fiber.
///
/// The future is not polled until it is admitted to a [`crate::Scheduler`],
/// either as the root of a `run` call or because some other fiber yielded
/// this handle.
pub fn spawn(body: impl Future<Output = Result<Value>> + 'static) -> FiberHandle {
    FiberHandle(Arc::new(Mutex::new(FiberCell::Unadmitted(Some(
        Box::pin(body),
    )))))
}
