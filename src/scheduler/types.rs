//! Core identifiers and the dependency tagged-sum.
//!
//! A fiber yields exactly one `Dependency` at each suspension point. The
//! enum is deliberately closed and explicit rather than duck-typed: a
//! background set can only ever contain fibers, a sequence can only ever
//! contain fibers and signal-waits, so most of the "malformed yield" cases a
//! dynamically-typed scheduler would need to guard against are simply
//! unrepresentable here. The handful that remain (duplicate wait tokens, a
//! signal awaited by
//! two different fibers in the same instant) are still checked at admission
//! time in `scheduler::scheduler`.

use crate::scheduler::fiber::FiberHandle;
use crate::scheduler::signal::WaitToken;

/// Identifies a single admitted fiber within one scheduler run.
///
/// IDs are assigned in admission order starting at 1 and are never reused
/// within the lifetime of a `Scheduler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiberId(pub(crate) u64);

impl FiberId {
    pub(crate) fn new(raw: u64) -> Self {
        FiberId(raw)
    }

    pub(crate) fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for FiberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fiber#{}", self.0)
    }
}

/// A single element of an ordered sequence, or the lone dependency of a
/// plain `yield`.
#[derive(Clone)]
pub enum SingleDependency {
    /// Wait for another fiber to finish, admitting it first if it is fresh.
    Fiber(FiberHandle),
    /// Wait for a signal to be set.
    SignalWait(WaitToken),
}

/// What a fiber is waiting on when it suspends.
///
/// This is the Rust analogue of the union of shapes a `yield` expression
/// could carry in the system this crate's scheduling model is drawn from:
/// nothing, a single thing, an ordered list of things, or an unordered set
/// of things to start but not wait for.
#[derive(Clone)]
pub enum Dependency {
    /// A bare cooperative yield: resume on the next scheduling round with no
    /// resume value.
    None,
    /// Wait for exactly one thing.
    Single(SingleDependency),
    /// Wait for all of these, in order, and resume with their results
    /// gathered into a `Value::List` in the same order.
    Sequence(Vec<SingleDependency>),
    /// Admit each of these fibers if fresh, then resume immediately without
    /// waiting on any of them.
    Background(Vec<FiberHandle>),
}

/// How errors and cancellations from multiple fibers are combined into the
/// `Err` a `Scheduler::run` call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMode {
    /// Report only the first error encountered; everything else cancelled
    /// during shutdown is discarded.
    Single,
    /// Report every error and every "interesting" cancellation (one that
    /// unwound through more than one fiber, or carries its own cause)
    /// together, origin first.
    Group,
    /// `Group` if more than one error-worthy fiber failed, `Single`
    /// otherwise. The default.
    Auto,
}

impl Default for AggregationMode {
    fn default() -> Self {
        AggregationMode::Auto
    }
}
