use vigil::{Diagnostics, Failure};

fn parse_port(raw: &'static str) -> impl Fn() -> std::future::Ready<Result<u16, Failure>> {
    move || std::future::ready(raw.parse::<u16>().map_err(Failure::error))
}

pub async fn run(diag: &Diagnostics) -> Result<(), String> {
    for raw in ["8080", "eighty"] {
        let guard = diag.guard(format!("parse_port({raw})"), parse_port(raw));
        guard
            .default(80)
            .finally(move || println!("parse_port({raw}) finished"));
        match guard.value().await {
            Some(port) => println!("{raw} -> port {port}"),
            None => return Err(format!("guard for {raw} settled without a value")),
        }
    }
    super::let_reports_settle(diag).await;
    Ok(())
}
