//! When one fiber fails, every other admitted fiber is cancelled; how the
//! resulting errors are folded together depends on the run's
//! `AggregationMode`.

use std::fmt;

use fiberloop::{join_all, spawn, yield_now, AggregationMode, Error, Result, RunError, Scheduler, Value};

#[derive(Debug)]
struct Boom;

impl fmt::Display for Boom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "boom")
    }
}

impl std::error::Error for Boom {}

#[derive(Debug)]
struct Improper;

impl fmt::Display for Improper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "did not respond properly to cancellation")
    }
}

impl std::error::Error for Improper {}

async fn failing() -> Result<Value> {
    yield_now().await?;
    Err(Error::user(Boom))
}

/// Loops forever, catching its own cancellation and re-raising it
/// unchanged, the way a well-behaved fiber is expected to.
async fn loops_and_re_raises_cancellation() -> Result<Value> {
    loop {
        if let Err(e) = yield_now().await {
            return Err(e);
        }
    }
}

/// Observes cancellation but responds improperly by raising a different
/// error instead of letting the cancellation itself propagate.
async fn loops_and_swallows_cancellation() -> Result<Value> {
    loop {
        if let Err(e) = yield_now().await {
            if e.is_cancelled() {
                return Err(Error::user(Improper));
            }
            return Err(e);
        }
    }
}

#[test]
fn single_mode_reports_only_the_origin_error() {
    let f = spawn(failing());
    let h = spawn(loops_and_re_raises_cancellation());
    let root = spawn(async move { join_all(vec![f, h]).await });

    let mut scheduler = Scheduler::with_mode(AggregationMode::Single);
    let err = scheduler.run(root).expect_err("the failing fiber should fail the run");
    assert!(matches!(err, RunError::Origin { .. }));
    assert_eq!(err.origin().to_string(), "boom");
    assert!(err.others().is_empty());
}

#[test]
fn group_mode_adds_non_cancellation_secondary_errors() {
    let f = spawn(failing());
    let h = spawn(loops_and_swallows_cancellation());
    let root = spawn(async move { join_all(vec![f, h]).await });

    let mut scheduler = Scheduler::with_mode(AggregationMode::Group);
    let err = scheduler.run(root).expect_err("the failing fiber should fail the run");
    match &err {
        RunError::Group { origin, others, .. } => {
            assert_eq!(origin.to_string(), "boom");
            assert_eq!(others.len(), 1);
            assert_eq!(others[0].to_string(), "did not respond properly to cancellation");
        }
        RunError::Origin { .. } => panic!("expected the improper-cancellation error to be folded in"),
    }
}

#[test]
fn auto_mode_collapses_to_origin_when_every_other_fiber_cancels_cleanly() {
    let f = spawn(failing());
    let h = spawn(loops_and_re_raises_cancellation());
    let root = spawn(async move { join_all(vec![f, h]).await });

    let mut scheduler = Scheduler::new(); // default aggregation is `Auto`
    let err = scheduler.run(root).expect_err("the failing fiber should fail the run");
    assert!(matches!(err, RunError::Origin { .. }));
}

#[test]
fn auto_mode_groups_when_a_second_real_error_exists() {
    let f = spawn(failing());
    let h = spawn(loops_and_swallows_cancellation());
    let root = spawn(async move { join_all(vec![f, h]).await });

    let mut scheduler = Scheduler::new();
    let err = scheduler.run(root).expect_err("the failing fiber should fail the run");
    assert!(matches!(err, RunError::Group { .. }));
    assert_eq!(err.others().len(), 1);
}
