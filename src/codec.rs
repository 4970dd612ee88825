//! CSV codec between Domo's headerless dataset CSV and JSON records.
//!
//! Reading is positional: Domo exports rows without a header, so each row is
//! zipped against the schema column list. Writing produces the same shape,
//! one row per record with cells in schema order and no header row.

use csv::ReaderBuilder;
use serde_json::{Map, Value};

use crate::error::RelayError;

/// One dataset row keyed by column name, in schema order.
pub type Record = Map<String, Value>;

/// Parse headerless CSV into records keyed by `columns`.
///
/// Rows shorter than the column list are padded with empty strings; extra
/// trailing cells are dropped.
pub fn records_from_csv(columns: &[String], csv_text: &str) -> Result<Vec<Record>, RelayError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| RelayError::Internal(format!("Failed to parse dataset CSV: {e}")))?;
        let record = columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let cell = row.get(i).unwrap_or_default();
                (name.clone(), Value::String(cell.to_string()))
            })
            .collect();
        records.push(record);
    }

    Ok(records)
}

/// Render records as headerless CSV in `columns` order.
///
/// Cells missing from a record are written empty. Rows are joined with `\n`
/// and the payload has no trailing newline.
pub fn records_to_csv(columns: &[String], records: &[Record]) -> String {
    records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|name| escape_cell(record.get(name)))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escape a single cell for upload.
///
/// `null` and absent values become empty. Everything else is stringified and
/// trimmed, one leading `'` (Domo's text-prefix marker) is removed, embedded
/// quotes are doubled and the cell is quoted if it holds a comma, quote or
/// line break.
pub fn escape_cell(value: Option<&Value>) -> String {
    let raw = match value {
        None | Some(Value::Null) => return String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    let trimmed = raw.trim();
    let unprefixed = trimmed.strip_prefix('\'').unwrap_or(trimmed);
    let escaped = unprefixed.replace('"', "\"\"");

    if escaped.contains([',', '"', '\n', '\r']) {
        format!("\"{escaped}\"")
    } else {
        escaped
    }
}
