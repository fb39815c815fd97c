use std::time::Duration;

use vigil::Diagnostics;

async fn load_level((name, millis): (&'static str, u64)) -> usize {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    name.len()
}

/// The second call outlives its deadline: it is abandoned, and its arguments
/// are snapshotted for the report.
pub async fn run(diag: &Diagnostics) -> Result<(), String> {
    let loader = diag.must_return("load_level", load_level, Duration::from_millis(300));

    for args in [("intro", 20), ("boss_arena", 5_000)] {
        match loader.call(args).await {
            Some(size) => println!("{} loaded ({size})", args.0),
            None => println!("{} did not return in time", args.0),
        }
    }

    super::let_reports_settle(diag).await;
    Ok(())
}
