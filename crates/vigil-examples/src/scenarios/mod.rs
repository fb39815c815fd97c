pub mod diff_state;
pub mod dispatch_storm;
pub mod guard_default;
pub mod must_return;
pub mod retry_exhaustion;
pub mod unobserved_failure;
pub mod wait_timeout;

use std::time::Duration;

use vigil::{Diagnostics, Subscription, export};

/// Subscribes to every report. In JSON mode each report is printed to stdout
/// as one line; otherwise the tracing logger already shows it.
pub(crate) fn attach_printer(diag: &Diagnostics, json: bool) -> Option<Subscription> {
    if !json {
        return None;
    }
    Some(diag.channel().subscribe(|report, _, _| {
        match export::report_to_json(report) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("failed to encode report: {e}"),
        }
    }))
}

/// Sleeps long enough for grace timers and dispatch windows opened so far to
/// fire.
pub(crate) async fn let_reports_settle(diag: &Diagnostics) {
    let config = diag.config();
    let wait = config.grace_period + config.dispatch_window + Duration::from_millis(50);
    tokio::time::sleep(wait).await;
}
