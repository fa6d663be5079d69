//! Import outcome reporting: failure CSV export and assignee breakdown

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::defaults::HEADER_ROW_OFFSET;
use crate::services::validator::display_fields;
use crate::types::{ColumnMap, FailureRecord, ImportReport, ImportSummary, RowOutcome};

const EXPORT_HEADERS: [&str; 5] = ["row", "reason", "name", "phone", "leadSource"];

/// Flat failure row as written to the export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub row_number: usize,
    pub reason: String,
    pub name: String,
    pub phone: String,
    pub lead_source: String,
}

/// Project failures into export rows, re-deriving display fields from each
/// stored raw row with `map`
pub fn to_exportable_rows(failures: &[FailureRecord], map: &ColumnMap) -> Vec<ExportRecord> {
    failures
        .iter()
        .map(|f| {
            let (name, phone, lead_source) = display_fields(&f.raw, map);
            ExportRecord {
                row_number: f.row_number,
                reason: f.reason.clone(),
                name,
                phone,
                lead_source,
            }
        })
        .collect()
}

/// Export rows of a finished run, using the mapping that run used
pub fn report_export_rows(report: &ImportReport) -> Vec<ExportRecord> {
    to_exportable_rows(&report.failures, &report.column_map)
}

/// Render records as CSV, header first
pub fn to_csv(records: &[ExportRecord]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(EXPORT_HEADERS)?;
    for r in records {
        let row_number = r.row_number.to_string();
        writer.write_record([
            row_number.as_str(),
            r.reason.as_str(),
            r.name.as_str(),
            r.phone.as_str(),
            r.lead_source.as_str(),
        ])?;
    }

    let bytes = writer.into_inner().context("Failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

pub fn failure_report_filename(at: DateTime<Utc>) -> String {
    format!("failed-leads-{}.csv", at.format("%Y%m%d-%H%M%S"))
}

/// Write the failure CSV of `report` into `dir`. No-op without failures.
pub fn write_failure_report(dir: &Path, report: &ImportReport) -> Result<Option<PathBuf>> {
    if report.failures.is_empty() {
        return Ok(None);
    }

    let csv = to_csv(&report_export_rows(report))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;
    let path = dir.join(failure_report_filename(report.finished_at));
    std::fs::write(&path, csv).with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Wrote {} failed rows to {}", report.failures.len(), path.display());
    Ok(Some(path))
}

/// Machine-readable run report. Outcomes are keyed by spreadsheet row.
pub fn report_json(report: &ImportReport, export_path: Option<&Path>) -> serde_json::Value {
    let outcomes: BTreeMap<usize, &RowOutcome> = report
        .outcomes
        .iter()
        .map(|(idx, outcome)| (idx + HEADER_ROW_OFFSET, outcome))
        .collect();

    json!({
        "runId": report.run_id,
        "state": report.state,
        "summary": report.summary,
        "failures": report_export_rows(report),
        "outcomes": outcomes,
        "exportPath": export_path,
    })
}

/// Assignees by lead count, highest first (ties by name)
pub fn ranked_assignees(summary: &ImportSummary) -> Vec<(String, u32)> {
    let mut entries: Vec<(String, u32)> = summary
        .assignee_counts
        .iter()
        .map(|(name, count)| (name.clone(), *count))
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries
}

/// Plain-text summary for the terminal
pub fn format_summary(summary: &ImportSummary) -> String {
    let mut out = String::from("Bulk assignment summary\n");
    out.push_str(&format!("Total rows: {}\n", summary.total));
    out.push_str(&format!("Success: {}\n", summary.success));
    out.push_str(&format!("Skipped (invalid): {}\n", summary.skipped));
    out.push_str(&format!("Failed: {}\n", summary.failed));
    if summary.halted {
        out.push_str(&format!("Not attempted: {}\n", summary.not_attempted));
        if let Some(reason) = &summary.halt_reason {
            match summary.halted_row {
                Some(row) => out.push_str(&format!("HALTED at row {}: {}\n", row, reason)),
                None => out.push_str(&format!("HALTED: {}\n", reason)),
            }
        }
    }

    let ranked = ranked_assignees(summary);
    out.push_str(&format!("\nAssigned per RM ({} active):\n", ranked.len()));
    if ranked.is_empty() {
        out.push_str("  No RM assignments recorded.\n");
    }
    for (i, (name, count)) in ranked.iter().enumerate() {
        out.push_str(&format!("  {}. {} {}\n", i + 1, name, count));
    }
    out
}
