//! Column mapping types: which spreadsheet column feeds which lead field

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the lead source of each row is resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "camelCase")]
pub enum LeadSourceMapping {
    /// Free-form platform/channel column, canonicalized (facebook/ig -> meta, ...)
    Platform { column: String },
    /// Column that already holds the lead source, used as-is (trimmed)
    Column { column: String },
    /// One literal source applied to every row
    Other { source: String },
}

/// Assignment of canonical lead fields to source columns.
///
/// `None` means the slot is unmapped. The map may be inconsistent while the
/// user is editing it; see `column_mapper::check_mapping`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMap {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub lead_source: Option<LeadSourceMapping>,
    pub email: Option<String>,
    pub remark: Option<String>,
    pub location: Option<String>,
    pub approach_at: Option<String>,
    /// Q&A columns in selection order (question = header, answer = cell)
    pub qa_columns: Vec<String>,
}

impl ColumnMap {
    /// Columns referenced by the single-value slots, with the slot using them
    pub fn slot_columns(&self) -> Vec<(MappingSlot, &str)> {
        let mut cols = Vec::new();
        if let Some(c) = &self.full_name {
            cols.push((MappingSlot::FullName, c.as_str()));
        }
        if let Some(c) = &self.phone {
            cols.push((MappingSlot::Phone, c.as_str()));
        }
        match &self.lead_source {
            Some(LeadSourceMapping::Platform { column }) => cols.push((MappingSlot::Platform, column.as_str())),
            Some(LeadSourceMapping::Column { column }) => cols.push((MappingSlot::LeadSource, column.as_str())),
            Some(LeadSourceMapping::Other { .. }) | None => {}
        }
        if let Some(c) = &self.email {
            cols.push((MappingSlot::Email, c.as_str()));
        }
        if let Some(c) = &self.remark {
            cols.push((MappingSlot::Remark, c.as_str()));
        }
        if let Some(c) = &self.location {
            cols.push((MappingSlot::Location, c.as_str()));
        }
        if let Some(c) = &self.approach_at {
            cols.push((MappingSlot::ApproachAt, c.as_str()));
        }
        cols
    }
}

/// Single-column slot of a `ColumnMap`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MappingSlot {
    FullName,
    Phone,
    Platform,
    LeadSource,
    Email,
    Remark,
    Location,
    ApproachAt,
}

impl MappingSlot {
    pub fn label(&self) -> &'static str {
        match self {
            MappingSlot::FullName => "full name",
            MappingSlot::Phone => "phone",
            MappingSlot::Platform => "platform",
            MappingSlot::LeadSource => "lead source",
            MappingSlot::Email => "email",
            MappingSlot::Remark => "remark",
            MappingSlot::Location => "location",
            MappingSlot::ApproachAt => "approach date",
        }
    }
}

/// Problem that prevents a mapping from being used for a run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingIssue {
    #[error("no column mapped to full name")]
    MissingFullName,
    #[error("no column mapped to phone")]
    MissingPhone,
    #[error("no lead source strategy selected")]
    MissingLeadSource,
    #[error("custom lead source is empty")]
    EmptyOtherSource,
    #[error("column '{column}' mapped to {} is not in the file", .slot.label())]
    UnknownColumn { slot: MappingSlot, column: String },
    #[error("Q&A column '{0}' is not in the file")]
    UnknownQaColumn(String),
    #[error("{0} Q&A columns selected, at most {max} allowed", max = crate::defaults::MAX_QA_COLUMNS)]
    TooManyQaColumns(usize),
    #[error("Q&A column '{0}' is already mapped to another field")]
    QaColumnConflict(String),
}
