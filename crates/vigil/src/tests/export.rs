use vigil_types::{DiffEntry, Level, PTime, Report, SnapshotId};

use crate::export::{DiffExport, diff_export_to_json, diff_to_json, report_from_json, report_to_json};

fn entry(path: &str, before: &str, after: &str) -> DiffEntry {
    DiffEntry {
        path: path.to_string(),
        before: before.to_string(),
        after: after.to_string(),
    }
}

#[test]
fn diff_json_keeps_paths_and_renderings() {
    let json = diff_to_json(&[entry("b.c", "2", "3")]).unwrap();
    assert!(json.starts_with('['));
    assert!(json.contains("\"path\""));
    assert!(json.contains("b.c"));
    assert!(json.contains("\"after\""));
}

#[test]
fn empty_diff_is_an_empty_array() {
    assert_eq!(diff_to_json(&[]).unwrap(), "[]");
}

#[test]
fn diff_export_names_its_snapshot() {
    let export = DiffExport {
        snapshot: SnapshotId::new(7).unwrap(),
        entries: vec![entry("hp", "10", "4")],
    };
    let json = diff_export_to_json(&export).unwrap();
    assert!(json.contains("\"snapshot\""));
    assert!(json.contains('7'));
    assert!(json.contains("hp"));
}

#[test]
fn report_survives_json() {
    let report = Report {
        level: Level::Warn,
        message: "[WARN] cache miss (x3 Events)".to_string(),
        count: 3,
        emitted_at: PTime::now(),
    };
    let json = report_to_json(&report).unwrap();
    assert!(json.contains("cache miss"));
    assert_eq!(report_from_json(&json).unwrap(), report);
}
