//! Universal properties of `Signal`: every fiber waiting at the time of a
//! `set()` resumes exactly once, `clear()` only affects future waits, and a
//! cross-thread `set()` reaches a scheduler that is blocked waiting for it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fiberloop::{join_all, run_in_thread, spawn, Scheduler, Signal, Value};

#[test]
fn set_releases_every_fiber_waiting_at_the_time_of_the_call() {
    let signal = Signal::new();
    let released = Arc::new(AtomicUsize::new(0));

    let waiters: Vec<_> = (0..8)
        .map(|_| {
            let signal = signal.clone();
            let released = released.clone();
            spawn(async move {
                signal.wait().await?;
                released.fetch_add(1, Ordering::AcqRel);
                Ok(Value::Unit)
            })
        })
        .collect();

    let setter = {
        let signal = signal.clone();
        spawn(async move {
            fiberloop::yield_now().await?;
            signal.set();
            Ok(Value::Unit)
        })
    };

    // The ready queue is FIFO (see ready_queue.rs), so `setter` - admitted
    // first - gets the next turn, but its body only does a bare `yield_now`
    // before calling `signal.set()`; that requeues it behind the 8 waiters,
    // which all get to register with the signal before `setter` runs again.
    let mut all = vec![setter];
    all.extend(waiters);
    let mut scheduler = Scheduler::new();
    scheduler.run_future(async move { join_all(all).await }).unwrap();

    assert_eq!(released.load(Ordering::Acquire), 8);
}

#[test]
fn is_set_reflects_set_and_clear() {
    let signal = Signal::new();
    assert!(!signal.is_set());
    signal.set();
    assert!(signal.is_set());
    signal.clear();
    assert!(!signal.is_set());
}

#[test]
fn waiting_on_an_already_set_signal_resolves_without_blocking() {
    let signal = Signal::new();
    signal.set();

    let fiber = {
        let signal = signal.clone();
        spawn(async move { signal.wait().await })
    };

    let mut scheduler = Scheduler::new();
    scheduler.run(fiber).unwrap();
}

#[test]
fn a_signal_set_from_a_worker_thread_wakes_a_blocked_scheduler() {
    let signal = Signal::new();

    let setter = {
        let signal = signal.clone();
        run_in_thread(move || {
            thread::sleep(Duration::from_millis(50));
            signal.set();
            Ok(Value::Unit)
        })
    };

    let waiter = {
        let signal = signal.clone();
        spawn(async move { signal.wait().await })
    };

    let mut scheduler = Scheduler::new();
    scheduler
        .run_future(async move { join_all(vec![setter, waiter]).await })
        .unwrap();
}
