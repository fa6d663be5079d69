//! Row validation and normalization against a column mapping

use thiserror::Error;

use crate::defaults::{MAX_QA_COLUMNS, PHONE_DIGITS};
use crate::services::normalizer::{
    coerce_date, normalize_lead_source, normalize_phone, prettify_header, split_full_name,
};
use crate::types::{cell_text, ClientQa, ColumnMap, LeadInput, LeadSourceMapping, RawRow};

/// Why a row cannot be imported
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowRejection {
    #[error("missing full name")]
    MissingName,
    #[error("phone has {digits} digits, expected {expected}", expected = PHONE_DIGITS)]
    InvalidPhone { digits: usize },
    #[error("missing lead source")]
    MissingLeadSource,
}

/// Valid row indexes (file order) and the number of invalid rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub valid_indexes: Vec<usize>,
    pub invalid_count: usize,
}

fn mapped_text(row: &RawRow, column: Option<&String>) -> String {
    column.map(|c| cell_text(row, c)).unwrap_or_default().trim().to_string()
}

fn optional_text(row: &RawRow, column: Option<&String>) -> Option<String> {
    Some(mapped_text(row, column)).filter(|s| !s.is_empty())
}

/// Lead source of `row` under the mapping's strategy, empty when unresolved
pub fn resolve_lead_source(row: &RawRow, map: &ColumnMap) -> String {
    match &map.lead_source {
        Some(LeadSourceMapping::Platform { column }) => normalize_lead_source(&cell_text(row, column)),
        Some(LeadSourceMapping::Column { column }) => cell_text(row, column).trim().to_string(),
        Some(LeadSourceMapping::Other { source }) => source.trim().to_string(),
        None => String::new(),
    }
}

/// Full name, phone and lead source as they would be submitted
pub fn display_fields(row: &RawRow, map: &ColumnMap) -> (String, String, String) {
    let name = split_full_name(&mapped_text(row, map.full_name.as_ref()));
    let full = [name.first_name, name.last_name]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let phone = normalize_phone(&mapped_text(row, map.phone.as_ref()));
    (full, phone, resolve_lead_source(row, map))
}

fn client_qa(row: &RawRow, map: &ColumnMap) -> Option<Vec<ClientQa>> {
    let entries: Vec<ClientQa> = map
        .qa_columns
        .iter()
        .take(MAX_QA_COLUMNS)
        .filter_map(|column| {
            let answer = cell_text(row, column).trim().to_string();
            (!answer.is_empty()).then(|| ClientQa {
                question: prettify_header(column),
                answer,
            })
        })
        .collect();
    (!entries.is_empty()).then_some(entries)
}

/// Validate `row` and build its creation payload
pub fn classify_row(row: &RawRow, map: &ColumnMap) -> Result<LeadInput, RowRejection> {
    let name = split_full_name(&mapped_text(row, map.full_name.as_ref()));
    if name.first_name.is_empty() {
        return Err(RowRejection::MissingName);
    }

    let phone = normalize_phone(&mapped_text(row, map.phone.as_ref()));
    if phone.len() != PHONE_DIGITS {
        return Err(RowRejection::InvalidPhone { digits: phone.len() });
    }

    let lead_source = resolve_lead_source(row, map);
    if lead_source.is_empty() {
        return Err(RowRejection::MissingLeadSource);
    }

    let approach_at = map
        .approach_at
        .as_ref()
        .and_then(|c| row.get(c))
        .and_then(coerce_date);

    Ok(LeadInput {
        first_name: name.first_name,
        last_name: name.last_name,
        phone,
        lead_source,
        email: optional_text(row, map.email.as_ref()),
        remark: optional_text(row, map.remark.as_ref()),
        location: optional_text(row, map.location.as_ref()),
        approach_at,
        client_qa: client_qa(row, map),
    })
}

/// Split rows into valid indexes and an invalid count. Pure; the same
/// inputs always yield the same partition.
pub fn partition(rows: &[RawRow], map: &ColumnMap) -> Partition {
    let mut result = Partition::default();
    for (idx, row) in rows.iter().enumerate() {
        match classify_row(row, map) {
            Ok(_) => result.valid_indexes.push(idx),
            Err(_) => result.invalid_count += 1,
        }
    }
    result
}

/// Row as shown in a pre-import preview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRow {
    pub index: usize,
    pub name: String,
    pub phone: String,
    pub lead_source: String,
    pub qa_answered: usize,
    pub rejection: Option<RowRejection>,
}

pub fn preview_rows(rows: &[RawRow], map: &ColumnMap) -> Vec<PreviewRow> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let (name, phone, lead_source) = display_fields(row, map);
            PreviewRow {
                index,
                name,
                phone,
                lead_source,
                qa_answered: client_qa(row, map).map_or(0, |qa| qa.len()),
                rejection: classify_row(row, map).err(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellValue;

    fn row(cells: &[(&str, CellValue)]) -> RawRow {
        cells.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn platform_map() -> ColumnMap {
        ColumnMap {
            full_name: Some("name".to_string()),
            phone: Some("phone".to_string()),
            lead_source: Some(LeadSourceMapping::Platform { column: "platform".to_string() }),
            location: Some("city".to_string()),
            approach_at: Some("created_time".to_string()),
            qa_columns: vec!["what_is_your_budget?".to_string(), "preferred_time".to_string()],
            ..Default::default()
        }
    }

    fn sample_rows() -> Vec<RawRow> {
        vec![
            row(&[("name", text("Asha Rao")), ("phone", CellValue::Number(919876543210.0)), ("platform", text("ig"))]),
            row(&[("name", text("")), ("phone", text("9876543210")), ("platform", text("fb"))]),
            row(&[("name", text("Ravi")), ("phone", text("12345")), ("platform", text("fb"))]),
            row(&[("name", text("Meena K")), ("phone", text("98765-43210")), ("platform", text(" "))]),
            row(&[("name", text("Kumar")), ("phone", text("+91 99999 88888")), ("platform", text("Walk-In"))]),
        ]
    }

    #[test]
    fn test_classify_row_builds_payload() {
        let r = row(&[
            ("name", text("  Asha  Devi Rao ")),
            ("phone", CellValue::Number(919876543210.0)),
            ("platform", text("Instagram")),
            ("city", text(" Chennai ")),
            ("created_time", text("2025-09-18 08:40:43+05:30")),
            ("what_is_your_budget?", text("10-25L")),
            ("preferred_time", text("")),
        ]);
        let lead = classify_row(&r, &platform_map()).unwrap();
        assert_eq!(lead.first_name, "Asha Devi");
        assert_eq!(lead.last_name, "Rao");
        assert_eq!(lead.phone, "9876543210");
        assert_eq!(lead.lead_source, "meta");
        assert_eq!(lead.location.as_deref(), Some("Chennai"));
        assert!(lead.email.is_none());
        assert!(lead.approach_at.is_some());
        let qa = lead.client_qa.unwrap();
        assert_eq!(qa.len(), 1);
        assert_eq!(qa[0].question, "what is your budget");
        assert_eq!(qa[0].answer, "10-25L");
    }

    #[test]
    fn test_classify_row_rejections() {
        let map = platform_map();
        let rows = sample_rows();
        assert_eq!(classify_row(&rows[1], &map), Err(RowRejection::MissingName));
        assert_eq!(classify_row(&rows[2], &map), Err(RowRejection::InvalidPhone { digits: 5 }));
        assert_eq!(classify_row(&rows[3], &map), Err(RowRejection::MissingLeadSource));
    }

    #[test]
    fn test_partition_preserves_order() {
        let p = partition(&sample_rows(), &platform_map());
        assert_eq!(p.valid_indexes, vec![0, 4]);
        assert_eq!(p.invalid_count, 3);
    }

    #[test]
    fn test_partition_is_idempotent() {
        let rows = sample_rows();
        let map = platform_map();
        assert_eq!(partition(&rows, &map), partition(&rows, &map));
    }

    #[test]
    fn test_other_source_literal_applies_to_all_rows() {
        let map = ColumnMap {
            lead_source: Some(LeadSourceMapping::Other { source: " webinar ".to_string() }),
            ..platform_map()
        };
        let p = partition(&sample_rows(), &map);
        assert_eq!(p.valid_indexes, vec![0, 3, 4]);
        assert_eq!(classify_row(&sample_rows()[3], &map).unwrap().lead_source, "webinar");
    }

    #[test]
    fn test_direct_lead_source_column_is_not_canonicalized() {
        let map = ColumnMap {
            lead_source: Some(LeadSourceMapping::Column { column: "platform".to_string() }),
            ..platform_map()
        };
        let lead = classify_row(&sample_rows()[4], &map).unwrap();
        assert_eq!(lead.lead_source, "Walk-In");
    }

    #[test]
    fn test_unmapped_mandatory_slot_invalidates_everything() {
        let map = ColumnMap { phone: None, ..platform_map() };
        let p = partition(&sample_rows(), &map);
        assert!(p.valid_indexes.is_empty());
        assert_eq!(p.invalid_count, 5);
    }

    #[test]
    fn test_preview_rows_flags_invalid() {
        let preview = preview_rows(&sample_rows(), &platform_map());
        assert_eq!(preview.len(), 5);
        assert_eq!(preview[0].name, "Asha Rao");
        assert_eq!(preview[0].lead_source, "meta");
        assert!(preview[0].rejection.is_none());
        assert_eq!(preview[2].rejection, Some(RowRejection::InvalidPhone { digits: 5 }));
    }
}
