//! Spreadsheet decoding (.xlsx, .xls, .csv) into header-keyed rows

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use thiserror::Error;
use tracing::{debug, info};

use crate::services::normalizer::spreadsheet_serial_to_datetime;
use crate::types::{CellValue, DecodedSheet, RawRow};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported file type '{0}', expected .xlsx, .xls or .csv")]
    UnsupportedExtension(String),
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid workbook: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("workbook has no sheets")]
    NoSheet,
    #[error("file has no header row")]
    EmptySheet,
}

/// Decode the first sheet of `path`, picking the format by extension
pub fn decode_file(path: &Path) -> Result<DecodedSheet, DecodeError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let sheet = match extension.as_str() {
        "csv" => decode_csv_reader(std::fs::File::open(path)?)?,
        "xlsx" | "xlsm" | "xls" => decode_workbook(path)?,
        other => return Err(DecodeError::UnsupportedExtension(other.to_string())),
    };

    info!(
        "Decoded {}: {} columns, {} rows",
        path.display(),
        sheet.headers.len(),
        sheet.rows.len()
    );
    Ok(sheet)
}

/// Decode CSV text; every non-empty cell is kept as text
pub fn decode_csv_reader<R: Read>(reader: R) -> Result<DecodedSheet, DecodeError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = csv_reader.records();
    let header_cells: Vec<String> = match records.next() {
        Some(record) => record?.iter().map(str::to_string).collect(),
        None => return Err(DecodeError::EmptySheet),
    };

    let mut body = Vec::new();
    for record in records {
        let record = record?;
        body.push(
            record
                .iter()
                .map(|v| {
                    if v.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(v.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(build_sheet(&header_cells, body))
}

fn decode_workbook(path: &Path) -> Result<DecodedSheet, DecodeError> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(DecodeError::NoSheet)?;
    debug!("Reading sheet '{}'", sheet_name);

    let range = workbook.worksheet_range(&sheet_name)?;
    let mut rows = range.rows();
    let header_cells: Vec<String> = match rows.next() {
        Some(cells) => cells.iter().map(|c| cell_from_data(c).as_text()).collect(),
        None => return Err(DecodeError::EmptySheet),
    };
    let body = rows.map(|cells| cells.iter().map(cell_from_data).collect()).collect();

    Ok(build_sheet(&header_cells, body))
}

fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Float(n) => CellValue::Number(*n),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => spreadsheet_serial_to_datetime(dt.as_f64())
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

/// Trimmed, unique column names. Blank headers become `column_N` (1-based
/// position); repeats get a `_2`, `_3`, ... suffix.
pub fn unique_headers(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .enumerate()
        .map(|(idx, h)| {
            let base = h.trim().trim_start_matches('\u{feff}').trim().to_string();
            let base = if base.is_empty() {
                format!("column_{}", idx + 1)
            } else {
                base
            };

            let mut name = base.clone();
            let mut n = 2;
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            name
        })
        .collect()
}

fn build_sheet(header_cells: &[String], body: Vec<Vec<CellValue>>) -> DecodedSheet {
    let headers = unique_headers(header_cells);

    let mut skipped = 0;
    let rows: Vec<RawRow> = body
        .into_iter()
        .filter(|cells| {
            let keep = cells.iter().any(|c| !c.is_blank());
            if !keep {
                skipped += 1;
            }
            keep
        })
        .map(|mut cells| {
            cells.resize(headers.len(), CellValue::Empty);
            headers.iter().cloned().zip(cells).collect()
        })
        .collect();

    if skipped > 0 {
        debug!("Skipped {} empty rows", skipped);
    }

    DecodedSheet { headers, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::cell_text;
    use std::io::Write;

    fn decode_str(text: &str) -> DecodedSheet {
        decode_csv_reader(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_csv_rows_keyed_by_header() {
        let sheet = decode_str("full_name,phone,platform\nAsha Rao,9876543210,ig\nRavi,9123456780,fb\n");
        assert_eq!(sheet.headers, vec!["full_name", "phone", "platform"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(cell_text(&sheet.rows[0], "full_name"), "Asha Rao");
        assert_eq!(cell_text(&sheet.rows[1], "platform"), "fb");
    }

    #[test]
    fn test_csv_skips_empty_rows_and_pads_short_rows() {
        let sheet = decode_str("name,phone,city\nAsha,98765\n,,\n\nRavi,91234,Chennai\n");
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].get("city"), Some(&CellValue::Empty));
        assert_eq!(cell_text(&sheet.rows[1], "city"), "Chennai");
    }

    #[test]
    fn test_csv_quoted_fields() {
        let sheet = decode_str("name,remark\n\"Rao, Asha\",\"said \"\"call later\"\"\"\n");
        assert_eq!(cell_text(&sheet.rows[0], "name"), "Rao, Asha");
        assert_eq!(cell_text(&sheet.rows[0], "remark"), "said \"call later\"");
    }

    #[test]
    fn test_empty_csv_is_an_error() {
        assert!(matches!(decode_csv_reader("".as_bytes()), Err(DecodeError::EmptySheet)));
    }

    #[test]
    fn test_header_only_csv_has_no_rows() {
        let sheet = decode_str("name,phone\n");
        assert_eq!(sheet.headers.len(), 2);
        assert!(sheet.rows.is_empty());
    }

    #[test]
    fn test_unique_headers() {
        let raw: Vec<String> = ["phone", " Name ", "", "phone", "phone"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            unique_headers(&raw),
            vec!["phone", "Name", "column_3", "phone_2", "phone_3"]
        );
    }

    #[test]
    fn test_unique_headers_strips_bom() {
        let raw = vec!["\u{feff}name".to_string()];
        assert_eq!(unique_headers(&raw), vec!["name"]);
    }

    #[test]
    fn test_cell_from_data() {
        assert_eq!(cell_from_data(&Data::Int(9876543210)), CellValue::Number(9876543210.0));
        assert_eq!(cell_from_data(&Data::String("x".into())), CellValue::Text("x".into()));
        assert_eq!(cell_from_data(&Data::Bool(true)), CellValue::Bool(true));
        assert_eq!(cell_from_data(&Data::Empty), CellValue::Empty);
    }

    #[test]
    fn test_decode_file_csv_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "name,phone").unwrap();
        writeln!(file, "Asha Rao,9876543210").unwrap();
        file.flush().unwrap();

        let sheet = decode_file(file.path()).unwrap();
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(cell_text(&sheet.rows[0], "phone"), "9876543210");
    }

    #[test]
    fn test_decode_file_rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        assert!(matches!(
            decode_file(file.path()),
            Err(DecodeError::UnsupportedExtension(ext)) if ext == "txt"
        ));
    }

    #[test]
    fn test_decode_file_missing_csv_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = decode_file(&dir.path().join("missing.csv"));
        assert!(matches!(result, Err(DecodeError::Io(_))));
    }

    #[test]
    fn test_decode_file_corrupt_workbook_fails() {
        let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        file.write_all(b"definitely not a zip archive").unwrap();
        file.flush().unwrap();
        assert!(decode_file(file.path()).is_err());
    }
}
