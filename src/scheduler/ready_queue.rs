//! The cross-thread ready queue.
//!
//! Pushed to from the scheduler thread (a fiber yielded `None`, or a
//! dependency resolved synchronously) and from arbitrary worker threads
//! (`Signal::set`, `ThreadBridge` completions). Popped only by the
//! scheduler thread, which — in step with the rest of this module's
//! `smol`-driven run loop — polls it and falls back to a short `Timer`
//! rather than blocking when it is momentarily empty but fibers are still
//! outstanding.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::types::FiberId;

#[derive(Clone, Default)]
pub(crate) struct ReadyQueue(Arc<Mutex<VecDeque<FiberId>>>);

impl ReadyQueue {
    pub(crate) fn new() -> Self {
        ReadyQueue(Arc::new(Mutex::new(VecDeque::new())))
    }

    /// Push to the front: used both for fibers that should resume on the
    /// very next scheduling round (fresh admissions, bare cooperative
    /// yields) and for re-enqueues driven by a completed `Waiter` — the
    /// ready queue is produced head-first throughout. `try_pop` drains from
    /// the opposite end (the tail), so this is a FIFO: the fiber that has
    /// been waiting longest runs next, which is what keeps a fiber that
    /// yields `None` in a loop from starving everything else (see
    /// `scheduler.rs`).
    pub(crate) fn push_front(&self, id: FiberId) {
        self.0.lock().unwrap().push_front(id);
    }

    /// Pop from the tail: paired with `push_front`, this is what makes the
    /// queue FIFO rather than a LIFO stack.
    pub(crate) fn try_pop(&self) -> Option<FiberId> {
        self.0.lock().unwrap().pop_back()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.lock().unwrap().is_empty()
    }
}
