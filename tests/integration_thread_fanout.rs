//! Gathering many thread-offloaded fibers runs their workers in parallel,
//! not one after another.

use std::time::{Duration, Instant};

use fiberloop::{join_all, run_in_thread, Scheduler, Value};

#[test]
fn thread_offload_fans_out_in_parallel() {
    let handles: Vec<_> = (0..100)
        .map(|i| {
            run_in_thread(move || {
                std::thread::sleep(Duration::from_millis(100));
                Ok(Value::number(i as f64 + 1.0))
            })
        })
        .collect();

    let mut scheduler = Scheduler::new();
    let start = Instant::now();
    let result = scheduler.run_future(async move { join_all(handles).await });
    let elapsed = start.elapsed();

    let values = result.unwrap();
    let items = values.as_list().unwrap();
    assert_eq!(items.len(), 100);
    for (i, v) in items.iter().enumerate() {
        assert_eq!(v.as_number(), Some(i as f64 + 1.0));
    }
    assert!(
        elapsed < Duration::from_millis(500),
        "expected the 100 workers to overlap, took {elapsed:?}"
    );
}

#[test]
fn thread_offload_propagates_worker_errors() {
    #[derive(Debug)]
    struct Boom;
    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "boom")
        }
    }
    impl std::error::Error for Boom {}

    let handle = run_in_thread(|| Err(fiberloop::Error::user(Boom)));

    let mut scheduler = Scheduler::new();
    let err = scheduler.run(handle).expect_err("worker error should propagate");
    assert_eq!(err.origin().to_string(), "boom");
}
