//! JSON rendering for diffs and reports.

use facet::Facet;
use vigil_types::{DiffEntry, Report, SnapshotId};

/// A diff together with the snapshot it was taken against.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct DiffExport {
    pub snapshot: SnapshotId,
    pub entries: Vec<DiffEntry>,
}

pub fn diff_to_json(entries: &[DiffEntry]) -> Result<String, String> {
    let entries = entries.to_vec();
    facet_json::to_string(&entries).map_err(|e| e.to_string())
}

pub fn diff_export_to_json(export: &DiffExport) -> Result<String, String> {
    facet_json::to_string(export).map_err(|e| e.to_string())
}

pub fn report_to_json(report: &Report) -> Result<String, String> {
    facet_json::to_string(report).map_err(|e| e.to_string())
}

pub fn report_from_json(text: &str) -> Result<Report, String> {
    facet_json::from_str(text).map_err(|e| e.to_string())
}
