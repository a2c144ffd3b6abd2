//! fiberloop
//!
//! A small single-threaded cooperative-concurrency runtime: fibers driven
//! by a completion-based scheduler, dependency specifications that suspend
//! on another fiber, a signal, an ordered sequence, or an unordered
//! background set, thread offload for blocking work, and a structured
//! cancellation cascade with aggregated errors when something fails.
//!
//! ```no_run
//! use fiberloop::{spawn, Scheduler, Value};
//!
//! fn add_one(x: f64) -> impl std::future::Future<Output = fiberloop::Result<Value>> {
//!     async move {
//!         fiberloop::yield_now().await?;
//!         Ok(Value::number(x + 1.0))
//!     }
//! }
//!
//! let mut scheduler = Scheduler::new();
//! let result = scheduler.run_future(async {
//!     let a = spawn(add_one(1.0)).join().await?;
//!     let b = spawn(add_one(2.0)).join().await?;
//!     Ok(Value::list(vec![a, b]))
//! });
//! assert_eq!(result.unwrap().to_string(), "[2, 3]");
//! ```

mod error;
mod scheduler;
mod value;

pub use error::{CancelledError, Error, Result};
pub use scheduler::{
    join_all, run_in_thread, run_in_thread_checked, spawn, spawn_background, yield_dependency,
    yield_now, AggregationMode, CancelToken, Dependency, DependencyFuture, FiberHandle, FiberPath,
    FiberState, RunError, Runtime, Scheduler, SchedulerConfig, Signal, SingleDependency,
    StepOutcome, ThreadBridge, WaitToken,
};
pub use value::Value;

// This crate never installs a `tracing` subscriber itself — see DESIGN.md.
// Binaries and tests that want scheduler diagnostics on stderr wire one up
// with `tracing_subscriber::fmt().init()` themselves.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke_add_one() {
        let mut scheduler = Scheduler::new();
        let result = scheduler.run_future(async {
            yield_now().await?;
            Ok(Value::number(2.0))
        });
        assert_eq!(result.unwrap().as_number(), Some(2.0));
    }
}
