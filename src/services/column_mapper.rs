//! Column mapping: auto-guess from headers, pure updates, pre-run check

use std::collections::HashSet;

use crate::defaults::MAX_QA_COLUMNS;
use crate::types::{ColumnMap, LeadSourceMapping, MappingIssue, MappingSlot};

const FULL_NAME_ALIASES: &[&str] = &["full_name", "name", "fullname", "full name"];
const PHONE_ALIASES: &[&str] = &["phone", "mobile", "phone_number", "phone number"];
const LEAD_SOURCE_ALIASES: &[&str] = &["lead_source", "lead source", "leadsource"];
const PLATFORM_ALIASES: &[&str] = &["platform", "source", "channel"];
const LOCATION_ALIASES: &[&str] = &["city", "location", "area"];
const EMAIL_ALIASES: &[&str] = &["email", "e-mail", "email_address"];
const REMARK_ALIASES: &[&str] = &["remark", "remarks", "notes"];
const APPROACH_AT_ALIASES: &[&str] = &["created_time", "created at", "created_at", "created"];

/// First header matching any alias (case-insensitive), in alias priority order
fn guess(headers: &[String], aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|alias| {
        headers
            .iter()
            .find(|h| h.trim().eq_ignore_ascii_case(alias))
            .cloned()
    })
}

/// Best-effort mapping from well-known header names. Q&A columns are left
/// for the user to pick.
pub fn auto_guess(headers: &[String]) -> ColumnMap {
    let lead_source = guess(headers, LEAD_SOURCE_ALIASES)
        .map(|column| LeadSourceMapping::Column { column })
        .or_else(|| guess(headers, PLATFORM_ALIASES).map(|column| LeadSourceMapping::Platform { column }));

    ColumnMap {
        full_name: guess(headers, FULL_NAME_ALIASES),
        phone: guess(headers, PHONE_ALIASES),
        lead_source,
        email: guess(headers, EMAIL_ALIASES),
        remark: guess(headers, REMARK_ALIASES),
        location: guess(headers, LOCATION_ALIASES),
        approach_at: guess(headers, APPROACH_AT_ALIASES),
        qa_columns: Vec::new(),
    }
}

/// Point `slot` at `column` (or unset it). Platform and lead-source slots
/// replace the lead-source strategy.
pub fn set_field(map: &ColumnMap, slot: MappingSlot, column: Option<String>) -> ColumnMap {
    let mut next = map.clone();
    match slot {
        MappingSlot::FullName => next.full_name = column,
        MappingSlot::Phone => next.phone = column,
        MappingSlot::Platform => next.lead_source = column.map(|column| LeadSourceMapping::Platform { column }),
        MappingSlot::LeadSource => next.lead_source = column.map(|column| LeadSourceMapping::Column { column }),
        MappingSlot::Email => next.email = column,
        MappingSlot::Remark => next.remark = column,
        MappingSlot::Location => next.location = column,
        MappingSlot::ApproachAt => next.approach_at = column,
    }
    next
}

/// Use one literal lead source for every row
pub fn set_other_source(map: &ColumnMap, source: &str) -> ColumnMap {
    let mut next = map.clone();
    next.lead_source = Some(LeadSourceMapping::Other { source: source.to_string() });
    next
}

/// Replace the Q&A selection, keeping at most `MAX_QA_COLUMNS`
pub fn set_qa_columns(map: &ColumnMap, columns: Vec<String>) -> ColumnMap {
    let mut next = map.clone();
    next.qa_columns = columns.into_iter().take(MAX_QA_COLUMNS).collect();
    next
}

/// Problems that make `map` unusable for a run against `headers`
pub fn check_mapping(map: &ColumnMap, headers: &[String]) -> Vec<MappingIssue> {
    let known: HashSet<&str> = headers.iter().map(String::as_str).collect();
    let mut issues = Vec::new();

    if map.full_name.is_none() {
        issues.push(MappingIssue::MissingFullName);
    }
    if map.phone.is_none() {
        issues.push(MappingIssue::MissingPhone);
    }
    match &map.lead_source {
        None => issues.push(MappingIssue::MissingLeadSource),
        Some(LeadSourceMapping::Other { source }) if source.trim().is_empty() => {
            issues.push(MappingIssue::EmptyOtherSource)
        }
        Some(_) => {}
    }

    let slot_columns = map.slot_columns();
    for (slot, column) in &slot_columns {
        if !known.contains(column) {
            issues.push(MappingIssue::UnknownColumn { slot: *slot, column: column.to_string() });
        }
    }

    if map.qa_columns.len() > MAX_QA_COLUMNS {
        issues.push(MappingIssue::TooManyQaColumns(map.qa_columns.len()));
    }
    let mapped: HashSet<&str> = slot_columns.iter().map(|(_, c)| *c).collect();
    let mut seen = HashSet::new();
    for column in &map.qa_columns {
        if !known.contains(column.as_str()) {
            issues.push(MappingIssue::UnknownQaColumn(column.clone()));
        } else if mapped.contains(column.as_str()) || !seen.insert(column.as_str()) {
            issues.push(MappingIssue::QaColumnConflict(column.clone()));
        }
    }

    issues
}
