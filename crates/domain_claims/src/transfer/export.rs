//! Bulk export
//!
//! Both formats carry the same fields in the same order as the import
//! schema, so an export can be imported again unchanged.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;

use crate::claim::ClaimRecord;
use crate::fields::Field;
use crate::ports::ClaimStore;
use crate::query::ExportFilter;
use super::error::ExportError;
use super::format::FileFormat;

/// A rendered export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub exported_at: DateTime<Utc>,
    /// Number of claims in the file
    pub record_count: usize,
}

/// One exported claim, field order is the file column order
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    id: i64,
    patient_name: &'a str,
    billed_amount: String,
    paid_amount: String,
    status: &'static str,
    insurer_name: &'a str,
    discharge_date: NaiveDate,
    cpt_codes: Option<&'a str>,
    denial_reason: Option<&'a str>,
}

impl<'a> From<&'a ClaimRecord> for ExportRow<'a> {
    fn from(record: &'a ClaimRecord) -> Self {
        let claim = &record.claim;
        Self {
            id: claim.id.value(),
            patient_name: &claim.patient_name,
            billed_amount: claim.billed_amount.to_string(),
            paid_amount: claim.paid_amount.to_string(),
            status: claim.status.as_str(),
            insurer_name: &claim.insurer_name,
            discharge_date: claim.discharge_date,
            cpt_codes: record.detail.as_ref().map(|d| d.cpt_codes.as_str()),
            denial_reason: record
                .detail
                .as_ref()
                .and_then(|d| d.denial_reason.as_deref()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ExportEnvelope<'a> {
    export_date: String,
    total_claims: usize,
    total_details: usize,
    filters: &'a ExportFilter,
    claims: Vec<ExportRow<'a>>,
}

/// Exports every claim matching the filter
pub async fn export_claims(
    store: &dyn ClaimStore,
    format: FileFormat,
    filter: &ExportFilter,
) -> Result<ExportFile, ExportError> {
    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        if from > to {
            return Err(ExportError::InvalidRange { from, to });
        }
    }

    let records = store.export_claims(filter).await?;
    let file = render(&records, format, filter, Utc::now())?;
    info!(
        %format,
        records = file.record_count,
        bytes = file.body.len(),
        "Claims exported"
    );
    Ok(file)
}

/// Renders records in the given format
pub fn render(
    records: &[ClaimRecord],
    format: FileFormat,
    filter: &ExportFilter,
    exported_at: DateTime<Utc>,
) -> Result<ExportFile, ExportError> {
    let total_details = records.iter().filter(|r| r.detail.is_some()).count();
    let export_date = exported_at.to_rfc3339_opts(SecondsFormat::Secs, true);

    let body = match format {
        FileFormat::Csv => render_csv(records, &export_date, total_details)?,
        FileFormat::Json => serde_json::to_vec_pretty(&ExportEnvelope {
            export_date,
            total_claims: records.len(),
            total_details,
            filters: filter,
            claims: records.iter().map(ExportRow::from).collect(),
        })?,
    };

    Ok(ExportFile {
        filename: format!(
            "claims_export_{}.{}",
            exported_at.format("%Y%m%d_%H%M%S"),
            format.extension()
        ),
        content_type: format.content_type(),
        body,
        exported_at,
        record_count: records.len(),
    })
}

fn render_csv(
    records: &[ClaimRecord],
    export_date: &str,
    total_details: usize,
) -> Result<Vec<u8>, ExportError> {
    let mut buffer = format!(
        "# export_date: {}\n# total_claims: {}\n# total_details: {}\n",
        export_date,
        records.len(),
        total_details
    )
    .into_bytes();

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .from_writer(&mut buffer);
    writer.write_record(
        Field::CLAIM_REQUIRED
            .iter()
            .chain(Field::CLAIM_OPTIONAL.iter())
            .map(|field| field.name()),
    )?;
    for record in records {
        writer.serialize(ExportRow::from(record))?;
    }
    writer.flush().map_err(csv::Error::from)?;
    drop(writer);

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::{Claim, ClaimDetail, ClaimStatus};
    use chrono::TimeZone;
    use core_kernel::{Amount, ClaimId};
    use rust_decimal_macros::dec;

    fn record(id: i64, detail: Option<(&str, Option<&str>)>) -> ClaimRecord {
        let claim_id = ClaimId::new(id).unwrap();
        ClaimRecord {
            claim: Claim::new(
                claim_id,
                "John Doe",
                Amount::new(dec!(15000.5)).unwrap(),
                Amount::new(dec!(12000)).unwrap(),
                ClaimStatus::UnderReview,
                "Blue Cross",
                NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            )
            .unwrap(),
            detail: detail.map(|(codes, reason)| ClaimDetail::new(claim_id, codes, reason).unwrap()),
        }
    }

    fn exported_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_csv_layout() {
        let records = vec![record(1, None), record(2, Some(("99204, 82947", Some("Not covered"))))];
        let file = render(&records, FileFormat::Csv, &ExportFilter::default(), exported_at()).unwrap();
        let text = String::from_utf8(file.body).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "# export_date: 2025-02-01T08:30:00Z");
        assert_eq!(lines[1], "# total_claims: 2");
        assert_eq!(lines[2], "# total_details: 1");
        assert_eq!(
            lines[3],
            "id|patient_name|billed_amount|paid_amount|status|insurer_name|discharge_date|cpt_codes|denial_reason"
        );
        assert_eq!(lines[4], "1|John Doe|15000.50|12000.00|Under Review|Blue Cross|2025-01-15||");
        assert_eq!(
            lines[5],
            "2|John Doe|15000.50|12000.00|Under Review|Blue Cross|2025-01-15|99204, 82947|Not covered"
        );
        assert_eq!(file.filename, "claims_export_20250201_083000.csv");
        assert_eq!(file.record_count, 2);
    }

    #[test]
    fn test_empty_csv_keeps_header() {
        let file = render(&[], FileFormat::Csv, &ExportFilter::default(), exported_at()).unwrap();
        let text = String::from_utf8(file.body).unwrap();
        assert!(text.lines().any(|line| line.starts_with("id|patient_name|")));
        assert_eq!(file.record_count, 0);
    }

    #[test]
    fn test_json_envelope() {
        let filter = ExportFilter {
            status: Some(ClaimStatus::UnderReview),
            ..Default::default()
        };
        let file = render(&[record(7, None)], FileFormat::Json, &filter, exported_at()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&file.body).unwrap();

        assert_eq!(value["total_claims"], 1);
        assert_eq!(value["total_details"], 0);
        assert_eq!(value["filters"]["status"], "Under Review");
        assert_eq!(value["claims"][0]["id"], 7);
        assert_eq!(value["claims"][0]["billed_amount"], "15000.50");
        assert!(value["claims"][0]["cpt_codes"].is_null());
        assert_eq!(file.content_type, "application/json");
    }
}
