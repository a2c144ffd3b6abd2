//! Aggregating the outcome of a run that ended in failure.
//!
//! When a fiber returns an error that is not itself a cancellation, the
//! whole run is torn down: every other admitted fiber has its cancel flag
//! set and is force-polled so it observes the cancellation at its current
//! suspension point (see `dependency::DependencyFuture::poll`). What comes
//! back from that cascade — the error that triggered shutdown, plus whatever
//! the other fibers returned on their way out — is folded into one `RunError`
//! according to the run's `AggregationMode`.

use std::fmt;

use crate::error::Error;

use super::types::AggregationMode;

/// The error a failed `Scheduler::run` call returns.
#[derive(Debug, Clone)]
pub enum RunError {
    /// Only the first error is reported; every other fiber's cancellation
    /// or secondary failure was discarded.
    Origin { origin: Error, path: FiberPath },
    /// The first error plus every other fiber's failure that was not a
    /// plain cancellation.
    Group {
        origin: Error,
        others: Vec<Error>,
        path: FiberPath,
    },
}

impl RunError {
    /// The error that triggered shutdown, regardless of aggregation mode.
    pub fn origin(&self) -> &Error {
        match self {
            RunError::Origin { origin, .. } => origin,
            RunError::Group { origin, .. } => origin,
        }
    }

    /// Every other error folded in alongside the origin, empty for
    /// `RunError::Origin`.
    pub fn others(&self) -> &[Error] {
        match self {
            RunError::Origin { .. } => &[],
            RunError::Group { others, .. } => others,
        }
    }

    /// The admission chain from the root fiber to the one that produced
    /// `origin`. Empty when the failure had no single attributable fiber
    /// (a detected cycle, for instance).
    pub fn fiber_path(&self) -> &FiberPath {
        match self {
            RunError::Origin { path, .. } => path,
            RunError::Group { path, .. } => path,
        }
    }
}

/// A readable admission chain from the root fiber down to the one that
/// raised `origin`, substituting for traceback stitching (Rust has no
/// mutable, introspectable stack trace object to splice fiber frames onto).
/// Empty when the failure was not attributable to one admitted fiber (for
/// example, a detected cycle).
#[derive(Debug, Clone, Default)]
pub struct FiberPath(pub(crate) Vec<String>);

impl FiberPath {
    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for FiberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" -> "))
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Origin { origin, .. } => write!(f, "{origin}"),
            RunError::Group { origin, others, .. } if others.is_empty() => write!(f, "{origin}"),
            RunError::Group { origin, others, .. } => {
                write!(f, "{origin} (plus {} other error(s): ", others.len())?;
                for (i, e) in others.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.origin())
    }
}

/// Fold the origin error and whatever the shutdown cascade collected from
/// other fibers into a single `RunError`, honoring `mode`.
pub(crate) fn aggregate(
    origin: Error,
    collected: Vec<Error>,
    mode: AggregationMode,
    path: FiberPath,
) -> RunError {
    let interesting: Vec<Error> = collected.into_iter().filter(|e| !e.is_cancelled()).collect();
    match mode {
        AggregationMode::Single => RunError::Origin { origin, path },
        AggregationMode::Group => RunError::Group {
            origin,
            others: interesting,
            path,
        },
        AggregationMode::Auto => {
            if interesting.is_empty() {
                RunError::Origin { origin, path }
            } else {
                RunError::Group {
                    origin,
                    others: interesting,
                    path,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CancelledError;

    #[test]
    fn single_mode_drops_everything_else() {
        let run_err = aggregate(
            Error::CycleDetected,
            vec![Error::Cancelled(CancelledError)],
            AggregationMode::Single,
            FiberPath::default(),
        );
        assert!(matches!(run_err, RunError::Origin { .. }));
    }

    #[test]
    fn auto_mode_collapses_when_only_cancellations_remain() {
        let run_err = aggregate(
            Error::CycleDetected,
            vec![Error::Cancelled(CancelledError), Error::Cancelled(CancelledError)],
            AggregationMode::Auto,
            FiberPath::default(),
        );
        assert!(matches!(run_err, RunError::Origin { .. }));
    }

    #[test]
    fn auto_mode_groups_when_a_second_real_error_exists() {
        let run_err = aggregate(
            Error::CycleDetected,
            vec![Error::DuplicateWaitToken, Error::Cancelled(CancelledError)],
            AggregationMode::Auto,
            FiberPath::default(),
        );
        match run_err {
            RunError::Group { others, .. } => assert_eq!(others.len(), 1),
            RunError::Origin { .. } => panic!("expected Group"),
        }
    }
}
