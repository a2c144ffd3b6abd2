//! `Scheduler::step_iter` exposes the same loop as `Scheduler::run`, one
//! externally-observable step at a time, for host code that wants to
//! interleave this scheduler with an event loop of its own.

use fiberloop::{join_all, spawn, yield_now, Error, Scheduler, StepOutcome, Value};

fn add_one(x: f64) -> impl std::future::Future<Output = fiberloop::Result<Value>> {
    async move {
        yield_now().await?;
        Ok(Value::number(x + 1.0))
    }
}

#[test]
fn stepping_to_completion_matches_run() {
    let root = spawn(async move {
        let a = spawn(add_one(1.0));
        let b = spawn(add_one(2.0));
        join_all(vec![a, b]).await
    });

    let mut scheduler = Scheduler::new();
    let mut runtime = scheduler.step_iter(root);

    let mut steps = 0;
    let result = loop {
        steps += 1;
        match runtime.step() {
            StepOutcome::Progressed => continue,
            StepOutcome::Finished(result) => break result,
        }
    };

    assert!(steps > 1, "a multi-fiber run should take more than one step");
    let values = result.unwrap();
    let items = values.as_list().unwrap();
    assert_eq!(items[0].as_number(), Some(2.0));
    assert_eq!(items[1].as_number(), Some(3.0));
}

#[test]
fn a_fiber_already_finished_resolves_on_the_first_step() {
    let root = spawn(async { Ok(Value::number(9.0)) });

    // Run it once so the handle caches its result...
    let mut warm = Scheduler::new();
    warm.run(root.clone()).unwrap();

    // ...then step a fresh scheduler over the same, now-finished handle.
    let mut scheduler = Scheduler::new();
    let mut runtime = scheduler.step_iter(root);
    match runtime.step() {
        StepOutcome::Finished(result) => assert_eq!(result.unwrap().as_number(), Some(9.0)),
        StepOutcome::Progressed => panic!("a finished fiber should resolve on the first step"),
    }
}

#[test]
#[should_panic(expected = "called again after the run finished")]
fn stepping_past_completion_panics() {
    let root = spawn(async { Ok(Value::number(1.0)) });
    let mut scheduler = Scheduler::new();
    let mut runtime = scheduler.step_iter(root);
    loop {
        if let StepOutcome::Finished(_) = runtime.step() {
            break;
        }
    }
    runtime.step();
}

#[test]
fn a_cycle_is_still_detected_through_step_iter() {
    use std::cell::RefCell;
    use std::rc::Rc;
    use fiberloop::FiberHandle;

    let f_cell: Rc<RefCell<Option<FiberHandle>>> = Rc::new(RefCell::new(None));
    let g_cell: Rc<RefCell<Option<FiberHandle>>> = Rc::new(RefCell::new(None));

    let f = spawn({
        let g_cell = g_cell.clone();
        async move {
            let g = g_cell.borrow().clone().unwrap();
            g.join().await
        }
    });
    *f_cell.borrow_mut() = Some(f.clone());

    let g = spawn({
        let f_cell = f_cell.clone();
        async move {
            let f = f_cell.borrow().clone().unwrap();
            f.join().await
        }
    });
    *g_cell.borrow_mut() = Some(g.clone());

    let h = spawn(async move { join_all(vec![f, g]).await });

    let mut scheduler = Scheduler::new();
    let mut runtime = scheduler.step_iter(h);
    let result = loop {
        match runtime.step() {
            StepOutcome::Progressed => continue,
            StepOutcome::Finished(result) => break result,
        }
    };
    let err = result.expect_err("a dependency cycle cannot resolve");
    assert!(matches!(err.origin(), Error::CycleDetected));
}
