use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use tokio::time::{Instant, sleep};
use vigil_types::{Captured, Failure, SnapshotId, table};

use super::recording;
use crate::RetryPolicy;

fn counting_failure(
    calls: Arc<AtomicU32>,
) -> impl Fn() -> std::future::Ready<Result<(), Failure>> + Send + Sync + 'static {
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Err(Failure::error("offline")))
    }
}

#[tokio::test(start_paused = true)]
async fn permanent_failure_runs_limit_times_and_reports_once() {
    let (diag, logger) = recording();
    diag.set_global_root(table! { "mode" => "sync" });
    let calls = Arc::new(AtomicU32::new(0));
    let started = Instant::now();

    let err = diag
        .catch_or_retry(
            "sync",
            counting_failure(calls.clone()),
            RetryPolicy::new(3, Duration::from_secs(1)),
        )
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(err.attempts, 3);
    assert_eq!(err.last_error, Failure::error("offline"));
    assert!(!err.fallback_invoked);
    // Linear backoff: 1s after the first attempt, 2s after the second.
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(3), "{waited:?}");
    assert!(waited < Duration::from_millis(3020), "{waited:?}");

    // One postmortem per failed attempt; the error names the last one.
    assert_eq!(diag.store().len(), 3);
    assert_eq!(err.snapshot, SnapshotId::new(3).unwrap());
    let last = diag.store().get(err.snapshot).unwrap();
    assert_eq!(last.value.get("mode"), Some(&Captured::Str("sync".into())));
    let meta = last.meta.as_ref().unwrap();
    assert_eq!(meta.get("attempt"), Some(&Captured::Int(3)));
    assert_eq!(meta.get("error"), Some(&Captured::Str("offline".into())));

    sleep(Duration::from_millis(200)).await;
    let fatal = logger.containing("[FATAL]");
    assert_eq!(fatal.len(), 1);
    assert!(
        fatal[0].starts_with("[FATAL] sync failed after 3 attempts: offline (snapshot #3)"),
        "{}",
        fatal[0]
    );
}

#[tokio::test(start_paused = true)]
async fn success_after_a_failure_returns_the_value() {
    let (diag, logger) = recording();
    let calls = Arc::new(AtomicU32::new(0));

    let value = diag
        .catch_or_retry(
            "connect",
            {
                let calls = calls.clone();
                move || {
                    let calls = calls.clone();
                    async move {
                        match calls.fetch_add(1, Ordering::SeqCst) {
                            0 => Err(Failure::error("refused")),
                            _ => Ok("connected"),
                        }
                    }
                }
            },
            RetryPolicy::default(),
        )
        .await;

    assert_eq!(value, Ok("connected"));
    assert_eq!(diag.store().len(), 1);
    sleep(Duration::from_millis(200)).await;
    assert!(logger.containing("[FATAL]").is_empty());
}

#[tokio::test(start_paused = true)]
async fn exhaustion_invokes_fallback_with_last_failure() {
    let (diag, _logger) = recording();
    let calls = Arc::new(AtomicU32::new(0));
    let fallback_saw_offline = Arc::new(AtomicBool::new(false));

    let policy = RetryPolicy::new(2, Duration::from_millis(10)).with_fallback({
        let flag = fallback_saw_offline.clone();
        move |failure| flag.store(failure.message() == "offline", Ordering::SeqCst)
    });
    let err = diag
        .catch_or_retry("sync", counting_failure(calls.clone()), policy)
        .await
        .unwrap_err();

    assert!(err.fallback_invoked);
    assert!(fallback_saw_offline.load(Ordering::SeqCst));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn panicking_attempts_are_retried() {
    let (diag, _logger) = recording();

    let err = diag
        .catch_or_retry(
            "explode",
            || async {
                if true {
                    panic!("bad state");
                }
                Ok::<(), Failure>(())
            },
            RetryPolicy::new(2, Duration::ZERO),
        )
        .await
        .unwrap_err();

    assert_eq!(err.attempts, 2);
    assert_eq!(err.last_error.to_string(), "panicked: bad state");
}
