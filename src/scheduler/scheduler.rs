//! The scheduler: admits fibers, steps them, and tears everything down on
//! the first uncancelled error.
//!
//! Exactly one fiber's future is ever being polled at a time, on whichever
//! thread calls [`Scheduler::run`]. Single-stepping a future is done with
//! `smol::future::poll_once` rather than a hand-rolled waker, and the run
//! loop itself is driven by `smol::block_on` with a short `smol::Timer`
//! fallback instead of busy spinning while it waits on cross-thread work (a
//! signal, a thread-bridge result) to land.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::value::Value;

use super::context::{self, ActiveContext, Local};
use super::dependency::admit;
use super::fiber::{spawn, FiberCell, FiberHandle};
use super::ready_queue::ReadyQueue;
use super::shutdown::{self, FiberPath, RunError};
use super::types::{AggregationMode, FiberId};

/// Tunables for a [`Scheduler`] instance.
///
/// An explicit config struct with `Default` rather than file- or env-based
/// configuration — this is a library, not a service, and the scheduler has
/// exactly two things worth tuning.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How long to sleep when the ready queue is empty but fibers remain,
    /// waiting for cross-thread work (a `Signal`, a `ThreadBridge`) to land.
    pub poll_interval: Duration,
    /// How shutdown folds multiple errors into one `RunError`.
    pub aggregation: AggregationMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            poll_interval: Duration::from_millis(1),
            aggregation: AggregationMode::default(),
        }
    }
}

/// Drives a fiber graph to completion.
///
/// A `Scheduler` is reusable: calling `run` more than once on the same
/// instance (with the same or a different root) starts a fresh scheduling
/// round, though any `FiberHandle` that finished in a prior round resolves
/// instantly rather than re-running, no matter which scheduler touches it.
pub struct Scheduler {
    local: Rc<RefCell<Local>>,
    ready: ReadyQueue,
    config: SchedulerConfig,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// A scheduler using [`SchedulerConfig::default`].
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// A scheduler that aggregates shutdown errors according to `mode`,
    /// otherwise using default tunables.
    pub fn with_mode(mode: AggregationMode) -> Self {
        Self::with_config(SchedulerConfig {
            aggregation: mode,
            ..SchedulerConfig::default()
        })
    }

    /// A scheduler configured with explicit tunables.
    pub fn with_config(config: SchedulerConfig) -> Self {
        Scheduler {
            local: Rc::new(RefCell::new(Local::default())),
            ready: ReadyQueue::new(),
            config,
        }
    }

    /// Run `root` to completion, admitting it first if it is fresh.
    pub fn run(&mut self, root: FiberHandle) -> std::result::Result<Value, RunError> {
        smol::block_on(self.run_async(root))
    }

    /// Convenience for the common case of running a bare future as the root.
    pub fn run_future(
        &mut self,
        body: impl std::future::Future<Output = Result<Value>> + 'static,
    ) -> std::result::Result<Value, RunError> {
        self.run(spawn(body))
    }

    /// Expose the same loop one externally-observable unit of work at a
    /// time, for adapter code that needs to interleave this scheduler's
    /// progress with another host's event loop instead of blocking inside
    /// [`Scheduler::run`] until `root` finishes.
    pub fn step_iter(&mut self, root: FiberHandle) -> Runtime<'_> {
        Runtime {
            scheduler: self,
            root,
            bootstrapped: false,
            done: false,
        }
    }

    async fn run_async(&mut self, root: FiberHandle) -> std::result::Result<Value, RunError> {
        let mut runtime = self.step_iter(root);
        loop {
            if let StepOutcome::Finished(result) = runtime.step_async().await {
                return result;
            }
        }
    }

    /// Poll one fiber once. Returns `None` if it yielded again (and was put
    /// back), `Some(Ok(()))` if it finished (successfully, or by observing
    /// its own cancellation), `Some(Err(e))` if it failed with an error
    /// that should trigger shutdown.
    async fn step(&mut self, id: FiberId) -> Option<std::result::Result<(), Error>> {
        let mut running = self.local.borrow_mut().running.remove(&id)?;

        trace!(fiber = %id, "stepping");
        context::enter(ActiveContext {
            local: self.local.clone(),
            ready: self.ready.clone(),
            current_fiber: id,
        });
        let polled = smol::future::poll_once(&mut running.future).await;
        context::exit();

        match polled {
            Some(outcome) => {
                let trigger_shutdown = matches!(&outcome, Err(e) if !e.is_cancelled());
                let err_for_shutdown = if trigger_shutdown {
                    Some(outcome.clone().unwrap_err())
                } else {
                    None
                };
                *running.cell.lock().unwrap() = FiberCell::Done(outcome);
                self.finish(id);
                Some(match err_for_shutdown {
                    Some(e) => Err(e),
                    None => Ok(()),
                })
            }
            None => {
                self.local.borrow_mut().running.insert(id, running);
                None
            }
        }
    }

    fn finish(&self, id: FiberId) {
        let waiters = self.local.borrow_mut().waiting_on.remove(&id).unwrap_or_default();
        self.local.borrow_mut().cancel_flags.remove(&id);
        for waiter in waiters {
            waiter.decrement();
        }
    }

    async fn shutdown_cascade(&mut self) -> Vec<Error> {
        {
            let local = self.local.borrow();
            for flag in local.cancel_flags.values() {
                flag.store(true, Ordering::Release);
            }
        }

        let mut collected = Vec::new();
        loop {
            let ids: Vec<FiberId> = self.local.borrow().running.keys().copied().collect();
            if ids.is_empty() {
                break;
            }
            for id in ids {
                if let Some(Err(e)) = self.step(id).await {
                    collected.push(e);
                }
            }
        }
        collected
    }
}

/// What one call to [`Runtime::step`] accomplished.
pub enum StepOutcome {
    /// The loop made progress: a fiber was stepped, or none were ready and
    /// it briefly waited for cross-thread work (a `Signal`, a thread-bridge
    /// completion) to land. Call `step` again.
    Progressed,
    /// `root` is finished; this is the same value [`Scheduler::run`] would
    /// have returned. Do not call `step` again.
    Finished(std::result::Result<Value, RunError>),
}

/// The same scheduling loop [`Scheduler::run`] drives to completion,
/// exposed one external wait at a time.
///
/// This is the Rust analogue of spec.md §4.1's `runtime(root, mode)`: host
/// code that already owns an event loop of its own (a GUI message pump, a
/// different async runtime) can call [`Runtime::step`] from inside that
/// loop instead of letting this crate block the calling thread for the
/// whole run.
pub struct Runtime<'a> {
    scheduler: &'a mut Scheduler,
    root: FiberHandle,
    bootstrapped: bool,
    done: bool,
}

impl Runtime<'_> {
    /// Advance the loop by one step: admits the root on the first call,
    /// then either steps one ready fiber, detects a cycle, or waits briefly
    /// for outstanding cross-thread work. Blocks the calling thread only for
    /// that one step, never for the whole run.
    ///
    /// Panics if called again after returning [`StepOutcome::Finished`].
    pub fn step(&mut self) -> StepOutcome {
        assert!(!self.done, "Runtime::step called again after the run finished");
        smol::block_on(self.step_async())
    }

    async fn step_async(&mut self) -> StepOutcome {
        if !self.bootstrapped {
            self.bootstrapped = true;
            if let FiberCell::Done(result) = &*self.root.0.lock().unwrap() {
                self.done = true;
                return StepOutcome::Finished(result.clone().map_err(|e| {
                    shutdown::aggregate(e, Vec::new(), self.scheduler.config.aggregation, FiberPath::default())
                }));
            }
            let bootstrap = ActiveContext {
                local: self.scheduler.local.clone(),
                ready: self.scheduler.ready.clone(),
                current_fiber: FiberId::new(0),
            };
            admit(&bootstrap, &self.root);
            return StepOutcome::Progressed;
        }

        if let Some(id) = self.scheduler.ready.try_pop() {
            if let Some(Err(origin)) = self.scheduler.step(id).await {
                debug!(fiber = %id, error = %origin, "fiber failed, beginning shutdown");
                let path = fiber_path(&self.scheduler.local.borrow(), id);
                let others = self.scheduler.shutdown_cascade().await;
                if !others.is_empty() {
                    error!(count = others.len(), "shutdown cascade collected secondary errors");
                }
                self.done = true;
                return StepOutcome::Finished(Err(shutdown::aggregate(
                    origin,
                    others,
                    self.scheduler.config.aggregation,
                    path,
                )));
            }
        } else if self.scheduler.local.borrow().running.is_empty() {
            self.done = true;
            let result = match &*self.root.0.lock().unwrap() {
                FiberCell::Done(result) => result.clone().map_err(|e| {
                    shutdown::aggregate(e, Vec::new(), self.scheduler.config.aggregation, FiberPath::default())
                }),
                _ => unreachable!("scheduling loop exited before the root fiber finished"),
            };
            return StepOutcome::Finished(result);
        } else if detect_cycle(&self.scheduler.local.borrow()) {
            warn!("cycle detected in fiber dependency graph");
            let others = self.scheduler.shutdown_cascade().await;
            self.done = true;
            return StepOutcome::Finished(Err(shutdown::aggregate(
                Error::cycle_detected(),
                others,
                self.scheduler.config.aggregation,
                FiberPath::default(),
            )));
        } else {
            smol::Timer::after(self.scheduler.config.poll_interval).await;
        }

        if self.scheduler.local.borrow().running.is_empty() {
            self.done = true;
            let result = match &*self.root.0.lock().unwrap() {
                FiberCell::Done(result) => result.clone().map_err(|e| {
                    shutdown::aggregate(e, Vec::new(), self.scheduler.config.aggregation, FiberPath::default())
                }),
                _ => unreachable!("scheduling loop exited before the root fiber finished"),
            };
            return StepOutcome::Finished(result);
        }
        StepOutcome::Progressed
    }
}

/// Build a readable "fiber path" from the root down to `id`, by walking
/// `Local::parent` edges backwards and reversing. Substitutes for traceback
/// stitching: Rust has no mutable, splice-able stack trace object the way
/// the system this scheduler is modeled on does.
fn fiber_path(local: &Local, id: FiberId) -> FiberPath {
    let mut chain = vec![id];
    let mut current = id;
    while let Some(&parent) = local.parent.get(&current) {
        chain.push(parent);
        current = parent;
    }
    chain.reverse();
    FiberPath(chain.into_iter().map(|id| id.to_string()).collect())
}

/// Check whether the fiber-to-fiber dependency graph captured in
/// `waiting_on` contains a cycle. Signal waits never appear in this graph,
/// so this only ever fires for the case it is meant to catch: two or more
/// fibers transitively awaiting each other.
fn detect_cycle(local: &Local) -> bool {
    let mut adjacency: HashMap<FiberId, Vec<FiberId>> = HashMap::new();
    for (&target, waiters) in &local.waiting_on {
        for waiter in waiters {
            adjacency.entry(waiter.fiber()).or_default().push(target);
        }
    }

    let mut visited = HashSet::new();
    let mut on_stack = HashSet::new();
    let nodes: Vec<FiberId> = adjacency.keys().copied().collect();
    for node in nodes {
        if visit(node, &adjacency, &mut visited, &mut on_stack) {
            return true;
        }
    }
    false
}

fn visit(
    node: FiberId,
    adjacency: &HashMap<FiberId, Vec<FiberId>>,
    visited: &mut HashSet<FiberId>,
    on_stack: &mut HashSet<FiberId>,
) -> bool {
    if on_stack.contains(&node) {
        return true;
    }
    if visited.contains(&node) {
        return false;
    }
    visited.insert(node);
    on_stack.insert(node);
    if let Some(neighbors) = adjacency.get(&node) {
        for &neighbor in neighbors {
            if visit(neighbor, adjacency, visited, on_stack) {
                return true;
            }
        }
    }
    on_stack.remove(&node);
    false
}
