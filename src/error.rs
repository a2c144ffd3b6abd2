//! Error handling for the fiber scheduler core
//!
//! This module defines the error types produced by the scheduler itself
//! (cycle detection, duplicate wait tokens) and the sentinel used to deliver
//! cooperative cancellation, plus a way to carry an arbitrary user error
//! through the same `Result` fiber bodies return.

use std::fmt;
use std::sync::Arc;

/// Sentinel raised into a fiber when it is cancelled by shutdown (§4.5).
///
/// Distinct from [`Error`] so fiber bodies can tell "I am being shut down
/// because something else failed" apart from an ordinary error — matching a
/// base-exception type that sits outside the normal error hierarchy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CancelledError;

impl fmt::Display for CancelledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fiber cancelled")
    }
}

impl std::error::Error for CancelledError {}

/// Errors produced by the scheduler, or surfaced from user code.
#[derive(Debug, Clone)]
pub enum Error {
    /// The ready queue went empty while fibers remained, and the
    /// dependency graph built from `waiting_on` contains a cycle.
    CycleDetected,

    /// The same `WaitToken` was yielded more than once.
    DuplicateWaitToken,

    /// The fiber was cancelled as part of shutdown.
    Cancelled(CancelledError),

    /// An error raised by a fiber body or a thread-offloaded function.
    User(Arc<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CycleDetected => {
                write!(f, "Cycle detected in fiber dependency graph")
            }
            Error::DuplicateWaitToken => {
                write!(
                    f,
                    "the same wait token was yielded twice; make a new `Signal::wait()` call instead"
                )
            }
            Error::Cancelled(e) => write!(f, "{e}"),
            Error::User(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::User(e) => Some(e.as_ref()),
            Error::Cancelled(e) => Some(e),
            _ => None,
        }
    }
}

impl Error {
    /// Wrap an arbitrary user error so it can flow through a fiber's
    /// `Result<Value, Error>`.
    pub fn user(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::User(Arc::new(err))
    }

    /// Build a cycle-detected error.
    pub fn cycle_detected() -> Self {
        Error::CycleDetected
    }

    /// Build a duplicate-wait-token error.
    pub fn duplicate_wait_token() -> Self {
        Error::DuplicateWaitToken
    }

    /// True if this is the cancellation sentinel.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }
}

impl From<CancelledError> for Error {
    fn from(e: CancelledError) -> Self {
        Error::Cancelled(e)
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
