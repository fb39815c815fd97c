use std::time::Duration;

use tracing::info;
use vigil::{Diagnostics, Level};

/// Fires the same message `count` times in a tight loop, then once more after
/// the window closed: the first burst comes out as a single report with an
/// event count, the straggler as a fresh one.
pub async fn run(diag: &Diagnostics, count: u32, level: Level) -> Result<(), String> {
    info!(count, %level, "starting dispatch storm");
    diag.trail().record("dispatch_storm");
    for _ in 0..count {
        diag.dispatch("cache miss on hot path", level);
    }
    diag.dispatch("storm started", Level::Info);

    tokio::time::sleep(diag.config().dispatch_window + Duration::from_millis(50)).await;
    diag.dispatch("cache miss on hot path", level);
    super::let_reports_settle(diag).await;
    Ok(())
}
