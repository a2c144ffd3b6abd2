//! The scheduling core: fibers, dependency-driven suspension, thread
//! offload, and the shutdown cascade that aggregates errors.

mod context;
mod dependency;
mod fiber;
mod ready_queue;
mod scheduler;
mod shutdown;
mod signal;
mod thread_bridge;
mod types;
mod waiter;

pub use dependency::{join_all, spawn_background, yield_dependency, yield_now, DependencyFuture};
pub use fiber::{spawn, FiberHandle, FiberState};
pub use scheduler::{Runtime, Scheduler, SchedulerConfig, StepOutcome};
pub use shutdown::{FiberPath, RunError};
pub use signal::{Signal, WaitToken};
pub use thread_bridge::{run_in_thread, run_in_thread_checked, CancelToken, ThreadBridge};
pub use types::{AggregationMode, Dependency, SingleDependency};
