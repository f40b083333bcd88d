//! Claim aggregate and its one-to-one detail record

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{Amount, ClaimId};
use crate::error::ClaimError;

/// Maximum stored length of patient and insurer names
pub const MAX_NAME_LEN: usize = 255;
/// Maximum stored length of the procedure code list
pub const MAX_CPT_CODES_LEN: usize = 255;
/// Maximum stored length of a denial reason
pub const MAX_DENIAL_REASON_LEN: usize = 2000;

/// Claim status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimStatus {
    /// Settled by the insurer
    Paid,
    /// Rejected by the insurer
    Denied,
    /// Awaiting an insurer decision
    #[serde(rename = "Under Review")]
    UnderReview,
}

impl ClaimStatus {
    /// Every status, in display order
    pub const ALL: [ClaimStatus; 3] = [
        ClaimStatus::Paid,
        ClaimStatus::Denied,
        ClaimStatus::UnderReview,
    ];

    /// Returns the canonical label used in files and storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Paid => "Paid",
            ClaimStatus::Denied => "Denied",
            ClaimStatus::UnderReview => "Under Review",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ClaimStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == trimmed)
            .ok_or_else(|| ClaimError::InvalidStatus(trimmed.to_string()))
    }
}

/// An insurance claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Source-system identifier
    pub id: ClaimId,
    /// Patient name
    pub patient_name: String,
    /// Amount billed to the insurer
    pub billed_amount: Amount,
    /// Amount paid by the insurer
    pub paid_amount: Amount,
    /// Status
    pub status: ClaimStatus,
    /// Insurer name
    pub insurer_name: String,
    /// Date the patient was discharged
    pub discharge_date: NaiveDate,
}

impl Claim {
    /// Creates a claim, normalizing and validating the names
    pub fn new(
        id: ClaimId,
        patient_name: &str,
        billed_amount: Amount,
        paid_amount: Amount,
        status: ClaimStatus,
        insurer_name: &str,
        discharge_date: NaiveDate,
    ) -> Result<Self, ClaimError> {
        Ok(Self {
            id,
            patient_name: normalize_name("patient_name", patient_name)?,
            billed_amount,
            paid_amount,
            status,
            insurer_name: normalize_name("insurer_name", insurer_name)?,
            discharge_date,
        })
    }

    /// Changes the status, returning the previous one
    pub fn set_status(&mut self, status: ClaimStatus) -> ClaimStatus {
        std::mem::replace(&mut self.status, status)
    }

    /// Billed minus paid; negative when the insurer overpaid
    pub fn underpayment(&self) -> rust_decimal::Decimal {
        self.billed_amount.difference(&self.paid_amount)
    }
}

/// Procedure and denial information attached to a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDetail {
    /// Owning claim
    pub claim_id: ClaimId,
    /// Comma separated CPT procedure codes, e.g. "99204, 82947"
    pub cpt_codes: String,
    /// Reason given by the insurer for a denial
    pub denial_reason: Option<String>,
}

impl ClaimDetail {
    /// Creates a detail record
    ///
    /// An empty or whitespace denial reason is stored as `None`.
    pub fn new(
        claim_id: ClaimId,
        cpt_codes: &str,
        denial_reason: Option<&str>,
    ) -> Result<Self, ClaimError> {
        let cpt_codes = cpt_codes.trim();
        if cpt_codes.is_empty() {
            return Err(ClaimError::MissingField("cpt_codes".to_string()));
        }
        if cpt_codes.chars().count() > MAX_CPT_CODES_LEN {
            return Err(ClaimError::TooLong {
                field: "cpt_codes".to_string(),
                max: MAX_CPT_CODES_LEN,
            });
        }

        let denial_reason = denial_reason
            .map(str::trim)
            .filter(|reason| !reason.is_empty());
        if let Some(reason) = denial_reason {
            if reason.chars().count() > MAX_DENIAL_REASON_LEN {
                return Err(ClaimError::TooLong {
                    field: "denial_reason".to_string(),
                    max: MAX_DENIAL_REASON_LEN,
                });
            }
        }

        Ok(Self {
            claim_id,
            cpt_codes: cpt_codes.to_string(),
            denial_reason: denial_reason.map(str::to_string),
        })
    }
}

/// A claim together with its optional detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub claim: Claim,
    pub detail: Option<ClaimDetail>,
}

/// Trims a name, rejects blanks and truncates to the stored length
pub(crate) fn normalize_name(field: &str, raw: &str) -> Result<String, ClaimError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClaimError::MissingField(field.to_string()));
    }
    Ok(truncate_name(trimmed))
}

/// Cuts a name to the stored length; a cut landing on whitespace leaves no
/// trailing blank, so the stored value survives another trim unchanged
pub(crate) fn truncate_name(name: &str) -> String {
    let cut: String = name.chars().take(MAX_NAME_LEN).collect();
    cut.trim_end().to_string()
}
