use vigil::export::{DiffExport, diff_export_to_json};
use vigil::{Diagnostics, Level, Value, table};

struct Door {
    name: &'static str,
}

impl vigil::External for Door {
    fn kind(&self) -> &str {
        "Part"
    }

    fn name(&self) -> String {
        self.name.to_owned()
    }
}

/// Snapshots a small game state, mutates it, and reports what changed, both
/// against the snapshot and against the rolling history.
pub async fn run(diag: &Diagnostics) -> Result<(), String> {
    let state = table! {
        "player" => table! { "name" => "ada", "hp" => 20, "pos" => table! { "x" => 0, "y" => 0 } },
        "door" => Value::external(Door { name: "FrontDoor" }),
        "tick" => 0,
    };
    // A cycle, to show it is captured safely.
    state
        .inject("player.world", state.clone())
        .map_err(|e| format!("failed to link world: {e}"))?;

    let snapshot = diag.store().snapshot(&state, None);
    diag.store().snapshot_history(&state, Some("start"));

    for tick in 1..=3 {
        state
            .inject("tick", tick)
            .map_err(|e| format!("failed to advance tick: {e}"))?;
        state
            .inject("player.pos.x", tick * 2)
            .map_err(|e| format!("failed to move player: {e}"))?;
        diag.store().snapshot_history(&state, None);
    }
    state
        .inject("player.hp", 13)
        .map_err(|e| format!("failed to damage player: {e}"))?;
    state
        .inject("door", Value::external(Door { name: "BackDoor" }))
        .map_err(|e| format!("failed to swap door: {e}"))?;

    let entries = diag
        .store()
        .diff_snapshots(snapshot, &state)
        .map_err(|e| format!("diff against {snapshot} failed: {e}"))?;
    for entry in &entries {
        diag.dispatch(format!("state changed since {snapshot}: {entry}"), Level::Info);
    }
    let export = DiffExport { snapshot, entries };
    println!("{}", diff_export_to_json(&export)?);

    if let Some(entries) = diag.store().diff_history(&state, 1) {
        println!("{} change(s) since the first history entry", entries.len());
    }

    // Break the cycle so the state can be freed.
    state
        .inject("player.world", Value::Nil)
        .map_err(|e| format!("failed to unlink world: {e}"))?;
    super::let_reports_settle(diag).await;
    Ok(())
}
