//! Source file readers
//!
//! Both readers turn a whole file into [`RawRecord`]s or fail with a
//! [`FormatError`]. Record-level problems (a CSV row with the wrong number
//! of cells) are carried on the record and reported per row later.

use serde_json::Value;
use std::collections::HashSet;

use crate::fields::{Field, RawRecord, RawValue};
use super::error::FormatError;
use super::format::FileFormat;

/// The kind of record a file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Claims, optionally with detail columns
    Claim,
    /// Rows of a separate claim-details file
    Detail,
}

impl RecordKind {
    fn required(&self) -> &'static [Field] {
        match self {
            RecordKind::Claim => &Field::CLAIM_REQUIRED,
            RecordKind::Detail => &Field::DETAIL_REQUIRED,
        }
    }

    fn optional(&self) -> &'static [Field] {
        match self {
            RecordKind::Claim => &Field::CLAIM_OPTIONAL,
            RecordKind::Detail => &Field::DETAIL_OPTIONAL,
        }
    }

    /// Key holding the records inside an export envelope
    fn envelope_key(&self) -> &'static str {
        match self {
            RecordKind::Claim => "claims",
            RecordKind::Detail => "claim_details",
        }
    }

    fn knows(&self, column: &str) -> bool {
        self.required()
            .iter()
            .chain(self.optional())
            .any(|field| field.name() == column)
    }
}

/// Records read from one file
#[derive(Debug, Default)]
pub struct FileRecords {
    pub records: Vec<RawRecord>,
    /// The `claim_details` array of a JSON claims envelope, numbered from 1
    pub embedded_details: Option<Vec<RawRecord>>,
}

/// Reads every record of a file
pub fn read_records(
    bytes: &[u8],
    format: FileFormat,
    kind: RecordKind,
    max_rows: usize,
) -> Result<FileRecords, FormatError> {
    let text = std::str::from_utf8(bytes).map_err(|_| FormatError::NotUtf8)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.trim().is_empty() {
        return Err(FormatError::Empty);
    }

    match format {
        FileFormat::Csv => Ok(FileRecords {
            records: read_csv(text, kind, max_rows)?,
            embedded_details: None,
        }),
        FileFormat::Json => read_json(text, kind, max_rows),
    }
}

fn read_csv(text: &str, kind: RecordKind, max_rows: usize) -> Result<Vec<RawRecord>, FormatError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .comment(Some(b'#'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| FormatError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(FormatError::Empty);
    }
    check_columns(&headers, kind)?;

    let mut records = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let row = index + 1;
        if row > max_rows {
            return Err(FormatError::TooManyRows { limit: max_rows });
        }

        let cells = match result {
            Ok(cells) => cells,
            Err(e) => {
                records.push(RawRecord::malformed(row, e.to_string()));
                continue;
            }
        };
        if cells.len() != headers.len() {
            records.push(RawRecord::malformed(
                row,
                format!("expected {} fields, found {}", headers.len(), cells.len()),
            ));
            continue;
        }

        let mut record = RawRecord::new(row);
        for (name, cell) in headers.iter().zip(cells.iter()) {
            record.insert(name.clone(), RawValue::Text(cell.to_string()));
        }
        records.push(record);
    }

    Ok(records)
}

fn check_columns(headers: &[String], kind: RecordKind) -> Result<(), FormatError> {
    let mut seen = HashSet::new();
    if let Some(duplicate) = headers.iter().find(|h| !seen.insert(h.as_str())) {
        return Err(FormatError::DuplicateColumn(duplicate.clone()));
    }

    let missing: Vec<String> = kind
        .required()
        .iter()
        .filter(|field| !seen.contains(field.name()))
        .map(|field| field.name().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(FormatError::MissingColumns(missing));
    }

    let unknown: Vec<String> = headers
        .iter()
        .filter(|h| !kind.knows(h))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(FormatError::UnknownColumns(unknown));
    }

    Ok(())
}

fn read_json(text: &str, kind: RecordKind, max_rows: usize) -> Result<FileRecords, FormatError> {
    let value: Value = serde_json::from_str(text).map_err(|e| FormatError::Json(e.to_string()))?;

    let (items, embedded) = match value {
        Value::Array(items) => (items, None),
        Value::Object(mut envelope) => {
            let items = match envelope.remove(kind.envelope_key()) {
                Some(Value::Array(items)) => items,
                _ => return Err(FormatError::NotAnArray("an object")),
            };
            let embedded = match (kind, envelope.remove(RecordKind::Detail.envelope_key())) {
                (RecordKind::Claim, Some(Value::Array(details))) => Some(details),
                (RecordKind::Claim, Some(Value::Null)) | (_, None) => None,
                (RecordKind::Claim, Some(other)) => {
                    return Err(FormatError::NotAnArray(json_kind(&other)))
                }
                (RecordKind::Detail, Some(_)) => None,
            };
            (items, embedded)
        }
        other => return Err(FormatError::NotAnArray(json_kind(&other))),
    };

    Ok(FileRecords {
        records: json_records(items, max_rows)?,
        embedded_details: embedded
            .map(|details| json_records(details, max_rows))
            .transpose()?,
    })
}

fn json_records(items: Vec<Value>, max_rows: usize) -> Result<Vec<RawRecord>, FormatError> {
    if items.len() > max_rows {
        return Err(FormatError::TooManyRows { limit: max_rows });
    }

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let row = index + 1;
            let object = match item {
                Value::Object(object) => object,
                other => {
                    return Err(FormatError::NotAnObject {
                        index: row,
                        kind: json_kind(&other),
                    })
                }
            };

            let mut record = RawRecord::new(row);
            for (key, value) in object {
                record.insert(key.to_ascii_lowercase(), raw_value(value));
            }
            Ok(record)
        })
        .collect()
}

fn raw_value(value: Value) -> RawValue {
    match value {
        Value::String(s) => RawValue::Text(s),
        Value::Number(n) => RawValue::Number(n.to_string()),
        Value::Null => RawValue::Null,
        other => RawValue::Unsupported(json_kind(&other)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "id|patient_name|billed_amount|paid_amount|status|insurer_name|discharge_date";

    #[test]
    fn test_csv_skips_comments_and_reads_rows() {
        let text = format!(
            "# export_date: 2025-02-01T00:00:00Z\n# total_claims: 1\n{}\n99001|John Doe|15000.50|12000.00|Paid|Blue Cross|2025-01-15\n",
            HEADER
        );
        let records = read_records(text.as_bytes(), FileFormat::Csv, RecordKind::Claim, 10)
            .unwrap()
            .records;
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].get(Field::PatientName),
            Some(&RawValue::Text("John Doe".to_string()))
        );
    }

    #[test]
    fn test_comma_delimited_file_is_rejected() {
        let text = "id,patient_name,billed_amount,paid_amount,status,insurer_name,discharge_date\n1,a,1,1,Paid,b,2025-01-01\n";
        let result = read_records(text.as_bytes(), FileFormat::Csv, RecordKind::Claim, 10);
        assert!(matches!(result, Err(FormatError::MissingColumns(_))));
    }

    #[test]
    fn test_short_row_is_malformed_record() {
        let text = format!("{}\n1|Jane|10|5|Paid\n", HEADER);
        let records = read_records(text.as_bytes(), FileFormat::Csv, RecordKind::Claim, 10)
            .unwrap()
            .records;
        assert_eq!(records[0].malformed_reason(), Some("expected 7 fields, found 5"));
    }

    #[test]
    fn test_row_limit() {
        let text = format!("{}\n1|a|1|1|Paid|b|2025-01-01\n2|a|1|1|Paid|b|2025-01-01\n", HEADER);
        let result = read_records(text.as_bytes(), FileFormat::Csv, RecordKind::Claim, 1);
        assert_eq!(result.unwrap_err(), FormatError::TooManyRows { limit: 1 });
    }

    #[test]
    fn test_json_envelope_is_unwrapped() {
        let text = r#"{"export_date":"2025-02-01T00:00:00Z","claims":[{"id":5,"billed_amount":10.5}]}"#;
        let file = read_records(text.as_bytes(), FileFormat::Json, RecordKind::Claim, 10).unwrap();
        assert!(file.embedded_details.is_none());
        let records = file.records;
        assert_eq!(records[0].get(Field::Id), Some(&RawValue::Number("5".to_string())));
        assert_eq!(
            records[0].get(Field::BilledAmount),
            Some(&RawValue::Number("10.5".to_string()))
        );
    }

    #[test]
    fn test_json_envelope_carries_claim_details() {
        let text = r#"{"claims":[{"id":5}],"claim_details":[{"claim_id":5,"cpt_codes":"99213"}],"total_details":1}"#;
        let file = read_records(text.as_bytes(), FileFormat::Json, RecordKind::Claim, 10).unwrap();
        let details = file.embedded_details.unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].row, 1);
        assert_eq!(details[0].get(Field::ClaimId), Some(&RawValue::Number("5".to_string())));

        let bad = r#"{"claims":[],"claim_details":"99213"}"#;
        let result = read_records(bad.as_bytes(), FileFormat::Json, RecordKind::Claim, 10);
        assert_eq!(result.unwrap_err(), FormatError::NotAnArray("a string"));

        let too_many = r#"{"claims":[],"claim_details":[{},{}]}"#;
        let result = read_records(too_many.as_bytes(), FileFormat::Json, RecordKind::Claim, 1);
        assert_eq!(result.unwrap_err(), FormatError::TooManyRows { limit: 1 });
    }

    #[test]
    fn test_json_shape_errors() {
        let scalar = read_records(b"42", FileFormat::Json, RecordKind::Claim, 10);
        assert_eq!(scalar.unwrap_err(), FormatError::NotAnArray("a number"));

        let mixed = read_records(b"[{}, 3]", FileFormat::Json, RecordKind::Claim, 10);
        assert_eq!(
            mixed.unwrap_err(),
            FormatError::NotAnObject { index: 2, kind: "a number" }
        );

        let broken = read_records(b"[{", FileFormat::Json, RecordKind::Claim, 10);
        assert!(matches!(broken, Err(FormatError::Json(_))));
    }
}
