//! Thread-local handle to "the scheduler currently stepping a fiber".
//!
//! Fiber bodies never see a scheduler handle explicitly — the same way an
//! `async fn` running under an executor does not carry one either. Instead,
//! `Scheduler::step` pushes the active context before polling a fiber's
//! future and pops it afterwards, so that the combinator futures a fiber
//! awaits (see `dependency`) can find "which scheduler, which fiber am I"
//! without it being threaded through every function signature.
//!
//! This only ever runs on the single thread driving `Scheduler::run`; nested
//! entries exist only to make accidental reentrancy safe rather than to
//! support it as a feature.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::fiber::BoxedFiber;
use super::fiber::FiberCell;
use super::ready_queue::ReadyQueue;
use super::types::FiberId;
use super::waiter::Waiter;
use std::collections::HashMap;
use std::sync::Mutex;

pub(crate) struct Running {
    pub(crate) future: BoxedFiber,
    pub(crate) cell: Arc<Mutex<FiberCell>>,
}

/// Scheduler state that is only ever touched from the thread running the
/// loop. Cross-thread traffic (signals firing, thread-offloaded work
/// finishing) only ever reaches as far as a `Waiter` or the `ReadyQueue`,
/// never into here directly.
#[derive(Default)]
pub(crate) struct Local {
    next_id: u64,
    pub(crate) running: HashMap<FiberId, Running>,
    pub(crate) waiting_on: HashMap<FiberId, Vec<Arc<Waiter>>>,
    pub(crate) cancel_flags: HashMap<FiberId, Arc<AtomicBool>>,
    /// The fiber that admitted each fiber (whoever yielded its handle first),
    /// used only to build a readable "fiber path" on a `RunError` — never
    /// consulted for scheduling decisions.
    pub(crate) parent: HashMap<FiberId, FiberId>,
}

impl Local {
    pub(crate) fn next_id(&mut self) -> FiberId {
        self.next_id += 1;
        FiberId::new(self.next_id)
    }
}

#[derive(Clone)]
pub(crate) struct ActiveContext {
    pub(crate) local: Rc<RefCell<Local>>,
    pub(crate) ready: ReadyQueue,
    pub(crate) current_fiber: FiberId,
}

thread_local! {
    static CURRENT: RefCell<Vec<ActiveContext>> = const { RefCell::new(Vec::new()) };
}

pub(crate) fn enter(ctx: ActiveContext) {
    CURRENT.with(|c| c.borrow_mut().push(ctx));
}

pub(crate) fn exit() {
    CURRENT.with(|c| {
        c.borrow_mut().pop();
    });
}

pub(crate) fn current() -> Option<ActiveContext> {
    CURRENT.with(|c| c.borrow().last().cloned())
}

pub(crate) fn current_cancel_flag() -> Option<Arc<AtomicBool>> {
    let ctx = current()?;
    ctx.local
        .borrow()
        .cancel_flags
        .get(&ctx.current_fiber)
        .cloned()
}
