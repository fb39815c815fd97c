use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use vigil::{Diagnostics, Failure, RetryPolicy, table};

/// A connection that never comes up. Each attempt leaves a postmortem
/// snapshot; exhaustion leaves a single fatal report naming the last one.
pub async fn run(diag: &Diagnostics, attempts: u32) -> Result<(), String> {
    let connections = Arc::new(AtomicU32::new(0));
    diag.set_global_root(table! { "service" => "billing", "connected" => false });

    let policy = RetryPolicy::new(attempts, Duration::from_millis(100))
        .with_fallback(|failure| println!("falling back to cached billing data ({failure})"));
    let counter = Arc::clone(&connections);
    let result = diag
        .catch_or_retry(
            "billing.connect",
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err::<(), _>(Failure::error(format!("connection refused (try {n})"))) }
            },
            policy,
        )
        .await;

    match result {
        Ok(()) => println!("connected"),
        Err(exhausted) => {
            println!("{exhausted}");
            if let Some(snapshot) = diag.store().get(exhausted.snapshot)
                && let Some(meta) = &snapshot.meta
            {
                println!("postmortem {}: {meta}", snapshot.id);
            }
        }
    }
    super::let_reports_settle(diag).await;
    Ok(())
}
