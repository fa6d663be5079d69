//! Field normalization for imported lead rows
//!
//! Every function here is total: malformed input yields an empty string or
//! `None`, never an error.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::defaults::PHONE_DIGITS;
use crate::types::CellValue;

/// Largest spreadsheet serial we accept (9999-12-31)
const MAX_SPREADSHEET_SERIAL: f64 = 2_958_465.0;

/// Numbers at or above this are Unix epoch milliseconds, not serials
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

const META_MARKERS: &[&str] = &["facebook", "meta", "instagram"];
const META_TOKENS: &[&str] = &["fb", "ig"];
const GOOGLE_MARKERS: &[&str] = &["google", "adwords", "gads"];

/// First and last name split from a full name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitName {
    pub first_name: String,
    pub last_name: String,
}

/// Split a full name; the last token is the last name, everything before it
/// the first name.
pub fn split_full_name(full_name: &str) -> SplitName {
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    match parts.split_last() {
        None => SplitName::default(),
        Some((only, [])) => SplitName {
            first_name: only.to_string(),
            last_name: String::new(),
        },
        Some((last, rest)) => SplitName {
            first_name: rest.join(" "),
            last_name: last.to_string(),
        },
    }
}

/// Keep only digits and return the last `PHONE_DIGITS` of them
pub fn normalize_phone(raw: &str) -> String {
    let digits: Vec<char> = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let start = digits.len().saturating_sub(PHONE_DIGITS);
    digits[start..].iter().collect()
}

/// Canonicalize a platform/channel value to a lead source tag.
///
/// Unknown sources pass through lower-cased and trimmed.
pub fn normalize_lead_source(raw: &str) -> String {
    let s = raw.trim().to_lowercase();
    if s.is_empty() {
        return s;
    }

    // Short markers only count as whole tokens ("ig" must not match "digital")
    let has_token = |tokens: &[&str]| {
        s.split(|c: char| !c.is_ascii_alphanumeric())
            .any(|t| tokens.contains(&t))
    };

    if META_MARKERS.iter().any(|m| s.contains(m)) || has_token(META_TOKENS) {
        "meta".to_string()
    } else if GOOGLE_MARKERS.iter().any(|m| s.contains(m)) {
        "google".to_string()
    } else {
        s
    }
}

/// Convert a spreadsheet date serial (days since 1899-12-30, fraction =
/// time of day) to a UTC timestamp.
pub fn spreadsheet_serial_to_datetime(serial: f64) -> Option<DateTime<Utc>> {
    if !serial.is_finite() || serial < 0.0 || serial > MAX_SPREADSHEET_SERIAL {
        return None;
    }

    // Serials below 60 predate the phantom 1900-02-29
    let adjusted = if serial < 60.0 { serial + 1.0 } else { serial };
    let millis = (adjusted * MILLIS_PER_DAY).round() as i64;

    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let naive = epoch.checked_add_signed(Duration::milliseconds(millis))?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Best-effort conversion of a cell to a timestamp
pub fn coerce_date(cell: &CellValue) -> Option<DateTime<Utc>> {
    match cell {
        CellValue::DateTime(dt) => Some(*dt),
        CellValue::Number(n) if *n >= EPOCH_MILLIS_THRESHOLD => {
            DateTime::from_timestamp_millis(*n as i64)
        }
        CellValue::Number(n) => spreadsheet_serial_to_datetime(*n),
        CellValue::Text(s) => parse_date_text(s),
        CellValue::Empty | CellValue::Bool(_) => None,
    }
}

fn parse_date_text(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    // "2025-09-18 08:40:43+05:30" -> "2025-09-18T08:40:43+05:30"
    let iso = if s.contains('T') { s.to_string() } else { s.replacen(' ', "T", 1) };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&iso) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(&iso, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&iso, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Human-readable question label from a Q&A column header
pub fn prettify_header(header: &str) -> String {
    let spaced = header.replace('_', " ");
    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_end_matches('?').trim().to_string()
}
