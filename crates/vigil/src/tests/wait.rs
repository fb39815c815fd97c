use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, advance, sleep};
use vigil_types::{Captured, Failure};

use super::recording;
use crate::{PollPolicy, Throttle, WaitError};

#[tokio::test(start_paused = true)]
async fn wait_times_out_at_the_deadline_not_before() {
    let (diag, logger) = recording();
    let caught: Arc<Mutex<Option<WaitError>>> = Arc::default();
    let started = Instant::now();

    let wait = diag.wait_until("ready", || None::<()>, Duration::from_secs(1));
    wait.catch({
        let caught = caught.clone();
        move |error| *caught.lock() = Some(error.clone())
    });

    assert_eq!(wait.outcome().await, Err(WaitError::Timeout));
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(1), "{waited:?}");
    assert!(waited < Duration::from_millis(1020), "{waited:?}");
    assert_eq!(*caught.lock(), Some(WaitError::Timeout));
    assert_eq!(WaitError::Timeout.to_string(), "Timeout");

    assert_eq!(diag.store().len(), 1);
    sleep(Duration::from_millis(200)).await;
    let warned = logger.containing("wait_until ready timed out");
    assert_eq!(warned.len(), 1);
    assert!(warned[0].starts_with("[WARN]"), "{}", warned[0]);
}

#[tokio::test(start_paused = true)]
async fn wait_resolves_with_the_condition_value() {
    let (diag, _logger) = recording();
    let checks = Arc::new(AtomicU32::new(0));
    let seen: Arc<Mutex<Option<u32>>> = Arc::default();

    let wait = diag.wait_until(
        "third check",
        {
            let checks = checks.clone();
            move || {
                let n = checks.fetch_add(1, Ordering::SeqCst) + 1;
                (n == 3).then_some(n * 10)
            }
        },
        Duration::from_secs(5),
    );
    wait.then({
        let seen = seen.clone();
        move |value| *seen.lock() = Some(*value)
    });

    assert_eq!(wait.outcome().await, Ok(30));
    assert_eq!(*seen.lock(), Some(30));

    // Handlers attached after resolution run immediately.
    let late: Arc<Mutex<Option<u32>>> = Arc::default();
    wait.then({
        let late = late.clone();
        move |value| *late.lock() = Some(*value)
    });
    assert_eq!(*late.lock(), Some(30));
}

#[tokio::test(start_paused = true)]
async fn panicking_then_handler_does_not_starve_the_next_one() {
    let (diag, _logger) = recording();
    let seen: Arc<Mutex<Vec<u32>>> = Arc::default();

    let wait = diag.wait_until("ready", || Some(7u32), Duration::from_secs(1));
    wait.then(|_| panic!("handler bug"));
    wait.then({
        let seen = seen.clone();
        move |value| seen.lock().push(*value)
    });

    assert_eq!(wait.outcome().await, Ok(7));
    wait.then(|_| panic!("late handler bug"));
    wait.then({
        let seen = seen.clone();
        move |value| seen.lock().push(*value + 1)
    });
    assert_eq!(*seen.lock(), vec![7, 8]);
}

#[tokio::test(start_paused = true)]
async fn panicking_condition_stops_the_wait() {
    let (diag, _logger) = recording();

    let wait = diag.wait_until(
        "broken",
        || -> Option<()> { panic!("no state") },
        Duration::from_secs(5),
    );

    assert_eq!(
        wait.outcome().await,
        Err(WaitError::Panicked("no state".to_owned()))
    );
}

#[tokio::test(start_paused = true)]
async fn poll_returns_number_of_attempts() {
    let (diag, _logger) = recording();
    let actions = Arc::new(AtomicU32::new(0));

    let attempts = diag
        .poll_until(
            "warm cache",
            || {
                let n = actions.fetch_add(1, Ordering::SeqCst) + 1;
                match n {
                    1 => Err(Failure::error("cold")),
                    2 => panic!("flaky"),
                    _ => Ok(()),
                }
            },
            || actions.load(Ordering::SeqCst) >= 3,
            PollPolicy::default(),
        )
        .await;

    assert_eq!(attempts, Ok(3));
}

#[tokio::test(start_paused = true)]
async fn poll_timeout_is_fatal_and_snapshots() {
    let (diag, logger) = recording();
    let started = Instant::now();

    let err = diag
        .poll_until(
            "never",
            || Err(Failure::error("nope")),
            || false,
            PollPolicy {
                timeout: Duration::from_secs(1),
                interval: Duration::from_millis(250),
            },
        )
        .await
        .unwrap_err();

    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(1), "{waited:?}");
    assert!(waited < Duration::from_millis(1020), "{waited:?}");
    assert_eq!(err.attempts, 5);
    assert_eq!(err.failed_attempts, 5);
    assert!(diag.store().get(err.snapshot).is_some());

    sleep(Duration::from_millis(200)).await;
    assert_eq!(logger.containing("[FATAL] poll_until never timed out").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn must_return_gives_up_and_snapshots_arguments() {
    let (diag, logger) = recording();
    let slow = diag.must_return(
        "load level",
        |(name, delay_ms): (&'static str, u64)| async move {
            sleep(Duration::from_millis(delay_ms)).await;
            name.len()
        },
        Duration::from_secs(1),
    );

    assert_eq!(slow.call(("intro", 10)).await, Some(5));
    assert_eq!(slow.call(("boss", 10_000)).await, None);

    let snapshot = diag.store().get(vigil_types::SnapshotId::first()).unwrap();
    assert_eq!(snapshot.value.get(1), Some(&Captured::Str("boss".into())));
    assert_eq!(snapshot.value.get(2), Some(&Captured::Int(10_000)));

    sleep(Duration::from_millis(200)).await;
    let errors = logger.warn_lines();
    assert_eq!(errors.len(), 1);
    assert!(
        errors[0].starts_with("[ERROR] must_return load level did not return within 1000ms"),
        "{}",
        errors[0]
    );
}

#[tokio::test(start_paused = true)]
async fn throttle_accepts_one_call_per_interval() {
    let throttle = Throttle::new(Duration::from_millis(100));

    assert_eq!(throttle.call(|| 1), Some(1));
    assert_eq!(throttle.call(|| 2), None);
    advance(Duration::from_millis(99)).await;
    assert_eq!(throttle.call(|| 3), None);
    advance(Duration::from_millis(1)).await;
    assert_eq!(throttle.call(|| 4), Some(4));

    throttle.reset();
    assert_eq!(throttle.call(|| 5), Some(5));
}
