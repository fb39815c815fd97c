use vigil::{Diagnostics, Failure};

async fn fetch_profile() -> Result<String, Failure> {
    Err(Failure::error("profile service unreachable"))
}

/// Two failing informers: one is caught, the other is forgotten and gets
/// reported once the grace period runs out.
pub async fn run(diag: &Diagnostics) -> Result<(), String> {
    let caught = diag.informer("fetch_profile.caught", fetch_profile);
    caught.catch(|failure| println!("caught: {failure}"));

    let _forgotten = diag.informer("fetch_profile.forgotten", fetch_profile);

    super::let_reports_settle(diag).await;

    for entry in diag.unhandled().entries() {
        println!(
            "{} {} at {}: {} (observed: {})",
            entry.id, entry.label, entry.at, entry.failure, entry.observed
        );
    }
    Ok(())
}
