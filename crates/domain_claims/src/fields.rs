//! Typed field schema for claim records
//!
//! Source files are loosely typed: CSV cells are always text and JSON values
//! may be numbers, strings or null. Every field of the schema has its own
//! parse function that turns a [`RawValue`] into a typed value or a
//! [`FieldError`] naming the field and the problem.
//!
//! # Fields
//!
//! | field            | type          | required |
//! |------------------|---------------|----------|
//! | `id`             | `ClaimId`     | yes      |
//! | `patient_name`   | `String`      | yes      |
//! | `billed_amount`  | `Amount`      | yes      |
//! | `paid_amount`    | `Amount`      | yes      |
//! | `status`         | `ClaimStatus` | yes      |
//! | `insurer_name`   | `String`      | yes      |
//! | `discharge_date` | `NaiveDate`   | yes      |
//! | `cpt_codes`      | `String`      | no       |
//! | `denial_reason`  | `String`      | no       |
//!
//! A separate details file uses `claim_id`, `cpt_codes` and `denial_reason`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use core_kernel::{Amount, AmountError, ClaimId};
use crate::claim::{
    truncate_name, Claim, ClaimDetail, ClaimRecord, ClaimStatus, MAX_CPT_CODES_LEN,
    MAX_DENIAL_REASON_LEN,
};

/// Accepted discharge date layouts, tried in order
pub const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%d-%m-%Y",
];

/// A named field of the import/export schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Id,
    PatientName,
    BilledAmount,
    PaidAmount,
    Status,
    InsurerName,
    DischargeDate,
    CptCodes,
    DenialReason,
    ClaimId,
}

impl Field {
    /// Columns every claim record must carry, in file order
    pub const CLAIM_REQUIRED: [Field; 7] = [
        Field::Id,
        Field::PatientName,
        Field::BilledAmount,
        Field::PaidAmount,
        Field::Status,
        Field::InsurerName,
        Field::DischargeDate,
    ];

    /// Detail columns a claim record may carry
    pub const CLAIM_OPTIONAL: [Field; 2] = [Field::CptCodes, Field::DenialReason];

    /// Columns every details-file record must carry
    pub const DETAIL_REQUIRED: [Field; 2] = [Field::ClaimId, Field::CptCodes];

    /// Optional columns of a details-file record
    pub const DETAIL_OPTIONAL: [Field; 1] = [Field::DenialReason];

    /// Column name as it appears in files
    pub fn name(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::PatientName => "patient_name",
            Field::BilledAmount => "billed_amount",
            Field::PaidAmount => "paid_amount",
            Field::Status => "status",
            Field::InsurerName => "insurer_name",
            Field::DischargeDate => "discharge_date",
            Field::CptCodes => "cpt_codes",
            Field::DenialReason => "denial_reason",
            Field::ClaimId => "claim_id",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An untyped value read from a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// A string (every CSV cell, JSON strings)
    Text(String),
    /// A JSON number in its textual form
    Number(String),
    /// JSON null
    Null,
    /// A JSON value that no field accepts (bool, array, object)
    Unsupported(&'static str),
}

/// One record of a source file before validation
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    /// 1-based position of the record in its file
    pub row: usize,
    values: HashMap<String, RawValue>,
    malformed: Option<String>,
}

impl RawRecord {
    /// Creates an empty record
    pub fn new(row: usize) -> Self {
        Self {
            row,
            ..Default::default()
        }
    }

    /// Creates a record whose shape is already known to be wrong
    pub fn malformed(row: usize, reason: impl Into<String>) -> Self {
        Self {
            row,
            values: HashMap::new(),
            malformed: Some(reason.into()),
        }
    }

    /// Sets a value
    pub fn insert(&mut self, name: impl Into<String>, value: RawValue) {
        self.values.insert(name.into(), value);
    }

    /// Returns the value for a field, if present
    pub fn get(&self, field: Field) -> Option<&RawValue> {
        self.values.get(field.name())
    }

    /// Structural problem with the record, if any
    pub fn malformed_reason(&self) -> Option<&str> {
        self.malformed.as_deref()
    }

    /// Best-effort claim identifier for error reports
    pub fn id_hint(&self, field: Field) -> Option<i64> {
        match self.get(field) {
            Some(RawValue::Text(s)) | Some(RawValue::Number(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// What went wrong with a single field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldErrorKind {
    #[error("is required")]
    Missing,

    #[error("must be a string or number, got {0}")]
    WrongType(&'static str),

    #[error("'{0}' is not an integer")]
    NotAnInteger(String),

    #[error("must be a positive integer, got {0}")]
    NotPositive(i64),

    #[error("{0}")]
    Amount(AmountError),

    #[error("'{0}' is not one of: Paid, Denied, Under Review")]
    InvalidStatus(String),

    #[error("'{0}' is not a date, expected one of YYYY-MM-DD, MM/DD/YYYY, DD/MM/YYYY, YYYY/MM/DD, MM-DD-YYYY, DD-MM-YYYY")]
    InvalidDate(String),

    #[error("exceeds {0} characters")]
    TooLong(usize),

    #[error("requires {0}")]
    Requires(Field),
}

/// A single field failing validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} {kind}")]
pub struct FieldError {
    pub field: Field,
    pub kind: FieldErrorKind,
}

impl FieldError {
    pub fn new(field: Field, kind: FieldErrorKind) -> Self {
        Self { field, kind }
    }
}

/// Returns the non-blank text of a field, `None` when absent or blank
fn text(record: &RawRecord, field: Field) -> Result<Option<&str>, FieldError> {
    match record.get(field) {
        None | Some(RawValue::Null) => Ok(None),
        Some(RawValue::Text(s)) | Some(RawValue::Number(s)) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then_some(trimmed))
        }
        Some(RawValue::Unsupported(kind)) => {
            Err(FieldError::new(field, FieldErrorKind::WrongType(kind)))
        }
    }
}

fn required(record: &RawRecord, field: Field) -> Result<&str, FieldError> {
    text(record, field)?.ok_or_else(|| FieldError::new(field, FieldErrorKind::Missing))
}

/// Parses a claim identifier field (`id` or `claim_id`)
pub fn parse_claim_id(record: &RawRecord, field: Field) -> Result<ClaimId, FieldError> {
    let raw = required(record, field)?;
    let value: i64 = raw
        .parse()
        .map_err(|_| FieldError::new(field, FieldErrorKind::NotAnInteger(raw.to_string())))?;
    ClaimId::new(value).map_err(|_| FieldError::new(field, FieldErrorKind::NotPositive(value)))
}

/// Parses a name field, truncating to the stored length
pub fn parse_name(record: &RawRecord, field: Field) -> Result<String, FieldError> {
    let raw = required(record, field)?;
    Ok(truncate_name(raw))
}

/// Parses a monetary field
pub fn parse_amount(record: &RawRecord, field: Field) -> Result<Amount, FieldError> {
    let raw = required(record, field)?;
    Amount::parse(raw).map_err(|e| FieldError::new(field, FieldErrorKind::Amount(e)))
}

/// Parses the status field
pub fn parse_status(record: &RawRecord, field: Field) -> Result<ClaimStatus, FieldError> {
    let raw = required(record, field)?;
    raw.parse()
        .map_err(|_| FieldError::new(field, FieldErrorKind::InvalidStatus(raw.to_string())))
}

/// Parses a calendar date in any of the [`DATE_FORMATS`]
pub fn parse_date(record: &RawRecord, field: Field) -> Result<NaiveDate, FieldError> {
    let raw = required(record, field)?;
    parse_date_text(raw)
        .ok_or_else(|| FieldError::new(field, FieldErrorKind::InvalidDate(raw.to_string())))
}

/// Parses date text in any of the [`DATE_FORMATS`], first match wins
pub fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw.trim(), format).ok())
}

/// Parses an optional free-text field with a length limit
pub fn parse_optional_text(
    record: &RawRecord,
    field: Field,
    max_len: usize,
) -> Result<Option<String>, FieldError> {
    match text(record, field)? {
        Some(value) if value.chars().count() > max_len => {
            Err(FieldError::new(field, FieldErrorKind::TooLong(max_len)))
        }
        value => Ok(value.map(str::to_string)),
    }
}

/// Validates a claim record, collecting every failing field
pub fn claim_from_record(record: &RawRecord) -> Result<ClaimRecord, Vec<FieldError>> {
    let mut errors = Vec::new();

    let id = parse_claim_id(record, Field::Id).map_err(|e| errors.push(e)).ok();
    let patient_name = parse_name(record, Field::PatientName).map_err(|e| errors.push(e)).ok();
    let billed = parse_amount(record, Field::BilledAmount).map_err(|e| errors.push(e)).ok();
    let paid = parse_amount(record, Field::PaidAmount).map_err(|e| errors.push(e)).ok();
    let status = parse_status(record, Field::Status).map_err(|e| errors.push(e)).ok();
    let insurer_name = parse_name(record, Field::InsurerName).map_err(|e| errors.push(e)).ok();
    let discharge_date = parse_date(record, Field::DischargeDate).map_err(|e| errors.push(e)).ok();
    let cpt_codes = parse_optional_text(record, Field::CptCodes, MAX_CPT_CODES_LEN)
        .map_err(|e| errors.push(e))
        .ok()
        .flatten();
    let denial_reason = parse_optional_text(record, Field::DenialReason, MAX_DENIAL_REASON_LEN)
        .map_err(|e| errors.push(e))
        .ok()
        .flatten();

    if denial_reason.is_some() && matches!(text(record, Field::CptCodes), Ok(None)) {
        errors.push(FieldError::new(
            Field::DenialReason,
            FieldErrorKind::Requires(Field::CptCodes),
        ));
    }

    match (id, patient_name, billed, paid, status, insurer_name, discharge_date) {
        (
            Some(id),
            Some(patient_name),
            Some(billed),
            Some(paid),
            Some(status),
            Some(insurer_name),
            Some(discharge_date),
        ) if errors.is_empty() => {
            let claim = Claim {
                id,
                patient_name,
                billed_amount: billed,
                paid_amount: paid,
                status,
                insurer_name,
                discharge_date,
            };
            let detail = cpt_codes.map(|codes| ClaimDetail {
                claim_id: id,
                cpt_codes: codes,
                denial_reason,
            });
            Ok(ClaimRecord { claim, detail })
        }
        _ => Err(errors),
    }
}

/// Validates a details-file record
pub fn detail_from_record(record: &RawRecord) -> Result<ClaimDetail, Vec<FieldError>> {
    let mut errors = Vec::new();

    let claim_id = parse_claim_id(record, Field::ClaimId).map_err(|e| errors.push(e)).ok();
    let cpt_codes = parse_optional_text(record, Field::CptCodes, MAX_CPT_CODES_LEN)
        .map_err(|e| errors.push(e))
        .ok()
        .flatten();
    if matches!(text(record, Field::CptCodes), Ok(None)) {
        errors.push(FieldError::new(Field::CptCodes, FieldErrorKind::Missing));
    }
    let denial_reason = parse_optional_text(record, Field::DenialReason, MAX_DENIAL_REASON_LEN)
        .map_err(|e| errors.push(e))
        .ok()
        .flatten();

    match (claim_id, cpt_codes) {
        (Some(claim_id), Some(cpt_codes)) if errors.is_empty() => Ok(ClaimDetail {
            claim_id,
            cpt_codes,
            denial_reason,
        }),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(pairs: &[(&str, &str)]) -> RawRecord {
        let mut record = RawRecord::new(1);
        for (name, value) in pairs {
            record.insert(*name, RawValue::Text(value.to_string()));
        }
        record
    }

    fn valid_pairs() -> Vec<(&'static str, &'static str)> {
        vec![
            ("id", "99001"),
            ("patient_name", "John Doe"),
            ("billed_amount", "15000.50"),
            ("paid_amount", "12000.00"),
            ("status", "Paid"),
            ("insurer_name", "Blue Cross"),
            ("discharge_date", "2025-01-15"),
        ]
    }

    #[test]
    fn test_valid_claim_record() {
        let parsed = claim_from_record(&record(&valid_pairs())).unwrap();
        assert_eq!(parsed.claim.id.value(), 99001);
        assert_eq!(parsed.claim.billed_amount.value(), dec!(15000.50));
        assert_eq!(parsed.claim.status, ClaimStatus::Paid);
        assert!(parsed.detail.is_none());
    }

    #[test]
    fn test_collects_every_failing_field() {
        let mut pairs = valid_pairs();
        pairs[2] = ("billed_amount", "-3");
        pairs[4] = ("status", "Pending");
        let errors = claim_from_record(&record(&pairs)).unwrap_err();
        let fields: Vec<Field> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec![Field::BilledAmount, Field::Status]);
    }

    #[test]
    fn test_denial_reason_requires_codes() {
        let mut pairs = valid_pairs();
        pairs.push(("denial_reason", "Not covered"));
        let errors = claim_from_record(&record(&pairs)).unwrap_err();
        assert_eq!(errors[0].kind, FieldErrorKind::Requires(Field::CptCodes));
    }

    #[test]
    fn test_alternate_date_formats() {
        assert_eq!(
            parse_date_text("01/15/2025"),
            NaiveDate::from_ymd_opt(2025, 1, 15)
        );
        assert_eq!(
            parse_date_text("15/01/2025"),
            NaiveDate::from_ymd_opt(2025, 1, 15)
        );
        assert!(parse_date_text("2025-13-45").is_none());
    }

    #[test]
    fn test_unsupported_json_type() {
        let mut rec = record(&valid_pairs());
        rec.insert("status", RawValue::Unsupported("boolean"));
        let errors = claim_from_record(&rec).unwrap_err();
        assert_eq!(errors[0].kind, FieldErrorKind::WrongType("boolean"));
    }

    #[test]
    fn test_invalid_date_names_every_layout() {
        let message = FieldErrorKind::InvalidDate("soon".to_string()).to_string();
        for layout in ["YYYY-MM-DD", "MM/DD/YYYY", "DD/MM/YYYY", "YYYY/MM/DD", "MM-DD-YYYY", "DD-MM-YYYY"] {
            assert!(message.contains(layout), "{} missing from {}", layout, message);
        }
        assert_eq!(DATE_FORMATS.len(), 6);
    }

    #[test]
    fn test_truncated_name_has_no_trailing_blank() {
        let long = format!("{} {}", "a".repeat(254), "b".repeat(20));
        let mut pairs = valid_pairs();
        pairs[1] = ("patient_name", long.as_str());
        let parsed = claim_from_record(&record(&pairs)).unwrap();
        assert_eq!(parsed.claim.patient_name, "a".repeat(254));

        let again = parse_name(&record(&[("patient_name", parsed.claim.patient_name.as_str())]), Field::PatientName)
            .unwrap();
        assert_eq!(again, parsed.claim.patient_name);
    }
}
