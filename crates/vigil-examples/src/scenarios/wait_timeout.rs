use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use vigil::{Diagnostics, Failure, PollPolicy, Throttle, table};

pub async fn run(diag: &Diagnostics, timeout_ms: u64) -> Result<(), String> {
    diag.set_global_root(table! { "assets_loaded" => false });

    // Never becomes true: resolves through `catch` once the deadline passes.
    let never = diag.wait_until(
        "assets_loaded",
        || None::<()>,
        Duration::from_millis(timeout_ms),
    );
    never.catch(|error| println!("wait_until assets_loaded: {error}"));

    // Becomes true on the fifth check.
    let checks = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&checks);
    let ready = diag.wait_until(
        "fifth_check",
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            (n >= 5).then_some(n)
        },
        Duration::from_millis(timeout_ms),
    );
    ready.then(|n| println!("fifth_check satisfied after {n} checks"));

    let _ = ready.outcome().await;
    let _ = never.outcome().await;

    // Poll a flaky warm-up until the cache reports ready.
    let warmed = Arc::new(AtomicBool::new(false));
    let attempts = Arc::new(AtomicU32::new(0));
    let log_throttle = Throttle::new(Duration::from_millis(200));
    let polled = diag
        .poll_until(
            "cache.warm",
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                log_throttle.call(|| println!("warming cache, attempt {n}"));
                if n < 3 {
                    return Err(Failure::error("cache not reachable"));
                }
                warmed.store(true, Ordering::SeqCst);
                Ok(())
            },
            || warmed.load(Ordering::SeqCst),
            PollPolicy {
                timeout: Duration::from_millis(timeout_ms),
                interval: Duration::from_millis(50),
            },
        )
        .await
        .map_err(|e| e.to_string())?;
    println!("cache warmed after {polled} attempts");

    super::let_reports_settle(diag).await;
    Ok(())
}
