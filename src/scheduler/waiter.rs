//! Join counters: the thing a suspended fiber is actually parked on.
//!
//! Every suspension that isn't a bare cooperative yield — a single fiber, a
//! single signal, or an ordered sequence of several — is represented the
//! same way underneath: a `Waiter` with a counter seeded to the number of
//! outstanding dependencies. Each dependency that finishes calls
//! `decrement()`, and whichever call drives the counter to zero is the one
//! that pushes the waiting fiber back onto the ready queue. This can happen
//! from the scheduler thread (another fiber finished) or from a worker
//! thread (`ThreadBridge` completed, or something called `Signal::set`), so
//! the counter itself has to be thread-safe even though the ready queue it
//! feeds is otherwise only ever drained by the scheduler thread.

use std::sync::Mutex;

use super::ready_queue::ReadyQueue;
use super::types::FiberId;

pub(crate) struct Waiter {
    remaining: Mutex<usize>,
    fiber: FiberId,
    ready: ReadyQueue,
}

impl Waiter {
    pub(crate) fn new(fiber: FiberId, count: usize, ready: ReadyQueue) -> Self {
        Waiter {
            remaining: Mutex::new(count),
            fiber,
            ready,
        }
    }

    /// The fiber this waiter will requeue once its count reaches zero.
    pub(crate) fn fiber(&self) -> FiberId {
        self.fiber
    }

    /// Record that one dependency finished. If this was the last one
    /// outstanding, requeue the waiting fiber.
    pub(crate) fn decrement(&self) {
        let mut remaining = self.remaining.lock().unwrap();
        if *remaining == 0 {
            return;
        }
        *remaining -= 1;
        if *remaining == 0 {
            self.ready.push_front(self.fiber);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_on_last_decrement() {
        let ready = ReadyQueue::new();
        let waiter = Waiter::new(FiberId::new(1), 2, ready.clone());
        waiter.decrement();
        assert!(ready.try_pop().is_none());
        waiter.decrement();
        assert_eq!(ready.try_pop(), Some(FiberId::new(1)));
    }

    #[test]
    fn zero_count_fires_immediately_on_construction_is_caller_responsibility() {
        let ready = ReadyQueue::new();
        let waiter = Waiter::new(FiberId::new(7), 0, ready.clone());
        // A zero-count waiter never fires on its own; the caller is
        // expected to push the fiber directly instead of constructing one.
        waiter.decrement();
        assert!(ready.try_pop().is_none());
    }
}
