//! Import run types: decoded rows, per-row outcomes, progress and summary

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ColumnMap;

// =============================================================================
// DECODED INPUT
// =============================================================================

/// Raw spreadsheet cell as produced by the decoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Number(f64),
    DateTime(DateTime<Utc>),
    Text(String),
}

impl CellValue {
    /// Cell rendered as text. Whole numbers print without a fraction so
    /// phone numbers stored as numeric cells survive.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            CellValue::DateTime(dt) => dt.to_rfc3339(),
            CellValue::Text(s) => s.clone(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// One decoded row: column name -> cell
pub type RawRow = HashMap<String, CellValue>;

/// Text of `column` in `row`, empty when the column is absent
pub fn cell_text(row: &RawRow, column: &str) -> String {
    row.get(column).map(CellValue::as_text).unwrap_or_default()
}

/// Decoded file: header order plus rows in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedSheet {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

// =============================================================================
// PER-ROW RESULTS
// =============================================================================

/// Final state of one original row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RowOutcome {
    /// Created and assigned
    Success { assignee: String },
    /// Row-level remote failure
    Failed { reason: String },
    /// Excluded before the run by validation
    Skipped { reason: String },
    /// The row that hit the run-level fatal condition
    Halted { reason: String },
}

/// Failed row retained for the exportable report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    /// Decoded row index + 2 (header is row 1). Blank rows dropped by the
    /// decoder are not counted.
    pub row_number: usize,
    pub reason: String,
    pub raw: RawRow,
}

// =============================================================================
// RUN STATE
// =============================================================================

/// Lifecycle of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Halted,
}

/// Live progress of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgress {
    /// Number of valid rows queued for the run
    pub total: u32,
    pub done: u32,
    pub success: u32,
    pub failed: u32,
    /// Invalid rows, fixed when the run starts
    pub skipped: u32,
    pub halted: bool,
    pub halt_reason: Option<String>,
}

/// Folded result of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// All rows in the file
    pub total: u32,
    pub success: u32,
    pub failed: u32,
    pub skipped: u32,
    /// Valid rows left unfinished because the run halted
    pub not_attempted: u32,
    pub halted: bool,
    pub halt_reason: Option<String>,
    /// Row whose fatal error halted the run. Its lead may have been created
    /// without an assignee.
    pub halted_row: Option<usize>,
    pub assignee_counts: BTreeMap<String, u32>,
    pub duration_ms: u64,
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub run_id: Uuid,
    pub finished_at: DateTime<Utc>,
    pub state: RunState,
    pub summary: ImportSummary,
    /// Keyed by original row index; rows never claimed after a halt are absent
    pub outcomes: BTreeMap<usize, RowOutcome>,
    /// Sorted by row number
    pub failures: Vec<FailureRecord>,
    /// Mapping snapshot the run used
    pub column_map: ColumnMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_cell_renders_without_fraction() {
        assert_eq!(CellValue::Number(9876543210.0).as_text(), "9876543210");
        assert_eq!(CellValue::Number(1.5).as_text(), "1.5");
    }

    #[test]
    fn test_blank_cells() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::Text("   ".to_string()).is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
    }

    #[test]
    fn test_row_outcome_serializes_tagged() {
        let json = serde_json::to_string(&RowOutcome::Success { assignee: "Ramya".to_string() }).unwrap();
        assert!(json.contains("\"type\":\"success\""));
        assert!(json.contains("Ramya"));
    }

    #[test]
    fn test_cell_text_missing_column_is_empty() {
        let row = RawRow::new();
        assert_eq!(cell_text(&row, "phone"), "");
    }
}
