//! The single await point every fiber body suspends through.
//!
//! `yield_dependency` is the one primitive: every ergonomic helper in this
//! crate (`yield_now`, [`crate::Signal::wait`] used directly, `join_all`,
//! `spawn_background`, [`super::fiber::FiberHandle::join`]) builds a
//! [`Dependency`] value and drives it through here. Its `poll` method is
//! where §4.1's admission and resumption rules actually live: on first poll
//! it validates the shape, admits any fresh fibers, registers a `Waiter`
//! sized to the number of outstanding dependencies, and returns `Pending`;
//! on every later poll (including the forced poll shutdown uses to deliver
//! cancellation) it first checks the current fiber's cancel flag. That flag
//! is consumed, not just read: the first poll to observe it set clears it
//! and raises `Cancelled` into this await point, but the fiber's *next*
//! await behaves as if nothing happened, so cleanup code can still run
//! (await a drain, join a child) before it re-raises on its own. Once a
//! dependency it already registered is satisfied, it reads the result
//! straight back out of the handles or tokens it was given, rather than
//! through any separate result table.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::error::{CancelledError, Error, Result};
use crate::value::Value;

use super::context::{self, ActiveContext, Running};
use super::fiber::{FiberCell, FiberHandle};
use super::types::{Dependency, FiberId, SingleDependency};
use super::waiter::Waiter;

/// Admit `handle` if it is fresh, returning the `FiberId` it is (or was
/// already) known by. No-op for a handle that is already admitted.
///
/// Panics if `handle` has already finished; callers must check
/// `FiberCell::Done` themselves first, since a finished dependency resolves
/// without ever touching the scheduler's bookkeeping.
pub(crate) fn admit(ctx: &ActiveContext, handle: &FiberHandle) -> FiberId {
    let mut guard = handle.0.lock().unwrap();
    if let FiberCell::Admitted(id) = &*guard {
        return *id;
    }
    let future = match &mut *guard {
        FiberCell::Unadmitted(slot) => slot.take().expect("unadmitted fiber missing its body"),
        FiberCell::Done(_) => unreachable!("admit() called on a finished fiber"),
        FiberCell::Admitted(_) => unreachable!(),
    };
    let id = ctx.local.borrow_mut().next_id();
    *guard = FiberCell::Admitted(id);
    drop(guard);

    let mut local = ctx.local.borrow_mut();
    local.running.insert(
        id,
        Running {
            future,
            cell: handle.0.clone(),
        },
    );
    local.waiting_on.insert(id, Vec::new());
    local
        .cancel_flags
        .insert(id, Arc::new(std::sync::atomic::AtomicBool::new(false)));
    if ctx.current_fiber.raw() != 0 {
        local.parent.insert(id, ctx.current_fiber);
    }
    drop(local);

    tracing::trace!(fiber = %id, "admitted");
    ctx.ready.push_front(id);
    id
}

fn resolve_single(ctx: &ActiveContext, dep: &SingleDependency, waiter: &Arc<Waiter>) {
    match dep {
        SingleDependency::Fiber(handle) => {
            let already_done = matches!(&*handle.0.lock().unwrap(), FiberCell::Done(_));
            if already_done {
                waiter.decrement();
                return;
            }
            let id = admit(ctx, handle);
            ctx.local
                .borrow_mut()
                .waiting_on
                .entry(id)
                .or_default()
                .push(waiter.clone());
        }
        SingleDependency::SignalWait(token) => {
            if token.signal.register(waiter.clone()) {
                // registered; will fire on Signal::set
            } else {
                waiter.decrement();
            }
        }
    }
}

fn validate_duplicate_token(token: &super::signal::WaitToken) -> Result<()> {
    if token.mark_consumed() {
        Ok(())
    } else {
        Err(Error::duplicate_wait_token())
    }
}

fn validate_single(single: &SingleDependency) -> Result<()> {
    if let SingleDependency::SignalWait(token) = single {
        validate_duplicate_token(token)?;
    }
    Ok(())
}

fn validate_sequence(items: &[SingleDependency]) -> Result<()> {
    for item in items {
        validate_single(item)?;
    }
    Ok(())
}

enum DepState {
    Pending(Dependency),
    WaitingSingleFiber(FiberHandle),
    WaitingSingleSignal,
    WaitingSequence(Vec<SingleDependency>),
    WaitingNoneOrBackground,
    Done,
}

/// The future produced by [`yield_dependency`] and every combinator built
/// on top of it.
pub struct DependencyFuture {
    state: DepState,
}

impl Future for DependencyFuture {
    type Output = Result<Value>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<Value>> {
        let this = self.get_mut();

        if let Some(flag) = context::current_cancel_flag() {
            if flag.swap(false, Ordering::AcqRel) {
                this.state = DepState::Done;
                return Poll::Ready(Err(Error::Cancelled(CancelledError)));
            }
        }

        match std::mem::replace(&mut this.state, DepState::Done) {
            DepState::Pending(dep) => {
                let ctx = context::current()
                    .expect("a dependency was yielded from outside a running fiber");
                match dep {
                    Dependency::None => {
                        ctx.ready.push_front(ctx.current_fiber);
                        this.state = DepState::WaitingNoneOrBackground;
                        Poll::Pending
                    }
                    Dependency::Background(handles) => {
                        for handle in &handles {
                            let already_done =
                                matches!(&*handle.0.lock().unwrap(), FiberCell::Done(_));
                            if !already_done {
                                admit(&ctx, handle);
                            }
                        }
                        ctx.ready.push_front(ctx.current_fiber);
                        this.state = DepState::WaitingNoneOrBackground;
                        Poll::Pending
                    }
                    Dependency::Single(single) => {
                        if let Err(e) = validate_single(&single) {
                            return Poll::Ready(Err(e));
                        }
                        let waiter = Arc::new(Waiter::new(ctx.current_fiber, 1, ctx.ready.clone()));
                        resolve_single(&ctx, &single, &waiter);
                        this.state = match single {
                            SingleDependency::Fiber(h) => DepState::WaitingSingleFiber(h),
                            SingleDependency::SignalWait(_) => DepState::WaitingSingleSignal,
                        };
                        Poll::Pending
                    }
                    Dependency::Sequence(items) => {
                        if let Err(e) = validate_sequence(&items) {
                            return Poll::Ready(Err(e));
                        }
                        if items.is_empty() {
                            ctx.ready.push_front(ctx.current_fiber);
                            this.state = DepState::WaitingSequence(items);
                            return Poll::Pending;
                        }
                        let waiter =
                            Arc::new(Waiter::new(ctx.current_fiber, items.len(), ctx.ready.clone()));
                        for item in &items {
                            resolve_single(&ctx, item, &waiter);
                        }
                        this.state = DepState::WaitingSequence(items);
                        Poll::Pending
                    }
                }
            }
            DepState::WaitingSingleFiber(handle) => {
                let result = match &*handle.0.lock().unwrap() {
                    FiberCell::Done(r) => r.clone(),
                    _ => unreachable!("fiber dependency re-polled before it finished"),
                };
                Poll::Ready(result)
            }
            DepState::WaitingSingleSignal => Poll::Ready(Ok(Value::Unit)),
            DepState::WaitingSequence(items) => {
                if items.is_empty() {
                    return Poll::Ready(Ok(Value::List(Vec::new())));
                }
                let mut out = Vec::with_capacity(items.len());
                for item in &items {
                    match item {
                        SingleDependency::Fiber(handle) => match &*handle.0.lock().unwrap() {
                            FiberCell::Done(Ok(v)) => out.push(v.clone()),
                            FiberCell::Done(Err(e)) => return Poll::Ready(Err(e.clone())),
                            _ => unreachable!("sequence item re-polled before it finished"),
                        },
                        SingleDependency::SignalWait(_) => out.push(Value::Unit),
                    }
                }
                Poll::Ready(Ok(Value::List(out)))
            }
            DepState::WaitingNoneOrBackground => Poll::Ready(Ok(Value::Unit)),
            DepState::Done => panic!("DependencyFuture polled after it already completed"),
        }
    }
}

/// Suspend the current fiber on the given dependency specification.
///
/// This is the low-level primitive underneath every awaitable this crate
/// exposes; most fiber bodies will reach for [`yield_now`],
/// [`crate::Signal::wait`], [`join_all`], or [`spawn_background`] instead.
pub fn yield_dependency(dep: Dependency) -> DependencyFuture {
    DependencyFuture {
        state: DepState::Pending(dep),
    }
}

/// Yield control for one scheduling round with no dependency at all.
pub fn yield_now() -> DependencyFuture {
    yield_dependency(Dependency::None)
}

/// Wait for every fiber in `handles`, in order, resuming with their results
/// gathered into a `Value::List` in the same order. Admits any handle that
/// has not yet been started.
pub fn join_all(handles: impl IntoIterator<Item = FiberHandle>) -> DependencyFuture {
    let items = handles.into_iter().map(SingleDependency::Fiber).collect();
    yield_dependency(Dependency::Sequence(items))
}

/// Start each fiber in `handles` if it is fresh, then resume immediately
/// without waiting for any of them to finish.
pub fn spawn_background(handles: impl IntoIterator<Item = FiberHandle>) -> DependencyFuture {
    yield_dependency(Dependency::Background(handles.into_iter().collect()))
}
