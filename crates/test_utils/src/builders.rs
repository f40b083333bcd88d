//! Test Data Builders
//!
//! Builders for claims and import files. Only the fields a test cares about
//! need to be set; patient and insurer names default to `fake` values.

use chrono::NaiveDate;
use core_kernel::{Amount, ClaimId};
use domain_claims::{Claim, ClaimDetail, ClaimRecord, ClaimStatus};
use fake::faker::company::en::CompanyName;
use fake::faker::name::en::Name;
use fake::Fake;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::fixtures::{DateFixtures, CLAIMS_CSV_HEADER};

/// Builder for constructing test claims
#[derive(Debug, Clone)]
pub struct ClaimBuilder {
    id: i64,
    patient_name: String,
    billed_amount: Decimal,
    paid_amount: Decimal,
    status: ClaimStatus,
    insurer_name: String,
    discharge_date: NaiveDate,
    detail: Option<(String, Option<String>)>,
}

impl ClaimBuilder {
    /// Creates a new builder for the given claim id
    pub fn new(id: i64) -> Self {
        Self {
            id,
            patient_name: Name().fake(),
            billed_amount: dec!(1000.00),
            paid_amount: dec!(800.00),
            status: ClaimStatus::Paid,
            insurer_name: CompanyName().fake(),
            discharge_date: DateFixtures::discharge(),
            detail: None,
        }
    }

    /// Sets the patient name
    pub fn with_patient(mut self, name: impl Into<String>) -> Self {
        self.patient_name = name.into();
        self
    }

    /// Sets the billed and paid amounts
    pub fn with_amounts(mut self, billed: Decimal, paid: Decimal) -> Self {
        self.billed_amount = billed;
        self.paid_amount = paid;
        self
    }

    pub fn with_status(mut self, status: ClaimStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_insurer(mut self, insurer: impl Into<String>) -> Self {
        self.insurer_name = insurer.into();
        self
    }

    pub fn with_discharge_date(mut self, date: NaiveDate) -> Self {
        self.discharge_date = date;
        self
    }

    /// Attaches a detail record
    pub fn with_detail(mut self, cpt_codes: impl Into<String>, denial_reason: Option<&str>) -> Self {
        self.detail = Some((cpt_codes.into(), denial_reason.map(str::to_string)));
        self
    }

    /// Builds the claim
    ///
    /// # Panics
    ///
    /// Panics if the configured values violate the claim invariants
    pub fn build(&self) -> Claim {
        Claim::new(
            ClaimId::new(self.id).expect("builder id must be positive"),
            &self.patient_name,
            Amount::new(self.billed_amount).expect("builder billed amount must be valid"),
            Amount::new(self.paid_amount).expect("builder paid amount must be valid"),
            self.status,
            &self.insurer_name,
            self.discharge_date,
        )
        .expect("builder claim must be valid")
    }

    /// Builds the claim with its detail, if any
    pub fn build_record(&self) -> ClaimRecord {
        let claim = self.build();
        let detail = self.detail.as_ref().map(|(codes, reason)| {
            ClaimDetail::new(claim.id, codes, reason.as_deref()).expect("builder detail must be valid")
        });
        ClaimRecord { claim, detail }
    }
}

/// Builder for pipe-delimited claims files
///
/// Rows are written verbatim, so malformed rows can be mixed with valid ones.
#[derive(Debug, Clone)]
pub struct CsvFileBuilder {
    header: String,
    lines: Vec<String>,
}

impl Default for CsvFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvFileBuilder {
    /// Creates a builder with the full claims header
    pub fn new() -> Self {
        Self::with_header(CLAIMS_CSV_HEADER)
    }

    /// Creates a builder with a custom header line
    pub fn with_header(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            lines: Vec::new(),
        }
    }

    /// Appends a record in the full-header column order
    pub fn record(mut self, record: &ClaimRecord) -> Self {
        let claim = &record.claim;
        let (codes, reason) = match &record.detail {
            Some(detail) => (
                detail.cpt_codes.clone(),
                detail.denial_reason.clone().unwrap_or_default(),
            ),
            None => (String::new(), String::new()),
        };
        self.lines.push(format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}",
            claim.id,
            claim.patient_name,
            claim.billed_amount,
            claim.paid_amount,
            claim.status,
            claim.insurer_name,
            claim.discharge_date.format("%Y-%m-%d"),
            codes,
            reason
        ));
        self
    }

    /// Appends a raw line
    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn build(&self) -> String {
        let mut out = self.header.clone();
        out.push('\n');
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    pub fn build_bytes(&self) -> Vec<u8> {
        self.build().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_builder_defaults() {
        let claim = ClaimBuilder::new(7).build();
        assert_eq!(claim.id.value(), 7);
        assert!(!claim.patient_name.is_empty());
        assert!(!claim.insurer_name.is_empty());
        assert_eq!(claim.underpayment(), dec!(200.00));
    }

    #[test]
    fn test_csv_builder_writes_detail_columns() {
        let record = ClaimBuilder::new(5)
            .with_patient("Ann Lee")
            .with_insurer("Aetna")
            .with_status(ClaimStatus::Denied)
            .with_detail("99213", Some("Duplicate claim"))
            .build_record();
        let file = CsvFileBuilder::new().record(&record).build();
        assert!(file.ends_with(
            "5|Ann Lee|1000.00|800.00|Denied|Aetna|2025-01-15|99213|Duplicate claim\n"
        ));
    }
}
