//! Pre-built Test Fixtures
//!
//! Ready-to-use claims and import files. The values are fixed so tests can
//! assert on them directly.

use chrono::NaiveDate;
use core_kernel::{Amount, ClaimId};
use domain_claims::{Claim, ClaimDetail, ClaimRecord, ClaimStatus};
use rust_decimal_macros::dec;

/// Header of a claims file with every column
pub const CLAIMS_CSV_HEADER: &str =
    "id|patient_name|billed_amount|paid_amount|status|insurer_name|discharge_date|cpt_codes|denial_reason";

/// The single-claim file used throughout the import tests
pub const SINGLE_CLAIM_CSV: &str = "id|patient_name|billed_amount|paid_amount|status|insurer_name|discharge_date\n\
99001|John Doe|15000.50|12000.00|Paid|Blue Cross|2025-01-15\n";

/// Three valid claims, one with a detail
pub const SAMPLE_CLAIMS_CSV: &str = "id|patient_name|billed_amount|paid_amount|status|insurer_name|discharge_date|cpt_codes|denial_reason\n\
1001|Maria Garcia|2500.00|2100.00|Paid|Aetna|2025-02-03||\n\
1002|Wei Chen|$8,420.10|0|Denied|Cigna|02/14/2025|99214, 80053|Not medically necessary\n\
1003|Amara Okafor|640.00|320.00|Under Review|Blue Cross|2025-03-01||\n";

/// Three claims where the second is malformed
pub const ONE_BAD_ROW_CSV: &str = "id|patient_name|billed_amount|paid_amount|status|insurer_name|discharge_date\n\
2001|Ana Silva|100.00|50.00|Paid|Aetna|2025-01-01\n\
2002|Ben Stone|abc|50.00|Paid|Aetna|2025-01-02\n\
2003|Cara Diaz|300.00|0.00|Denied|Cigna|2025-01-03\n";

/// The same rows as [`SINGLE_CLAIM_CSV`] but comma delimited
pub const COMMA_DELIMITED_CSV: &str = "id,patient_name,billed_amount,paid_amount,status,insurer_name,discharge_date\n\
99001,John Doe,15000.50,12000.00,Paid,Blue Cross,2025-01-15\n";

/// Details file for [`SAMPLE_CLAIMS_CSV`]
pub const SAMPLE_DETAILS_CSV: &str = "claim_id|cpt_codes|denial_reason\n\
1001|99213|\n\
1003|99285, 71045|\n";

/// Two claims as a plain JSON array with numeric amounts
pub const SAMPLE_CLAIMS_JSON: &str = r#"[
  {"id": 3001, "patient_name": "Lena Park", "billed_amount": 1200.5, "paid_amount": "900.00",
   "status": "Paid", "insurer_name": "Humana", "discharge_date": "2025-04-10"},
  {"id": 3002, "patient_name": "Omar Haddad", "billed_amount": 75, "paid_amount": 0,
   "status": "Denied", "insurer_name": "Humana", "discharge_date": "2025-04-11",
   "cpt_codes": "99203", "denial_reason": "Out of network"}
]"#;

/// Fixture for claim records
pub struct ClaimFixtures;

impl ClaimFixtures {
    /// The claim imported by [`SINGLE_CLAIM_CSV`]
    pub fn john_doe() -> Claim {
        Claim::new(
            ClaimId::new(99001).expect("valid id"),
            "John Doe",
            Amount::new(dec!(15000.50)).expect("valid amount"),
            Amount::new(dec!(12000.00)).expect("valid amount"),
            ClaimStatus::Paid,
            "Blue Cross",
            DateFixtures::discharge(),
        )
        .expect("valid claim")
    }

    /// A denied claim with its detail
    pub fn denied_with_detail() -> ClaimRecord {
        let id = ClaimId::new(99002).expect("valid id");
        ClaimRecord {
            claim: Claim::new(
                id,
                "Jane Roe",
                Amount::new(dec!(980.00)).expect("valid amount"),
                Amount::zero(),
                ClaimStatus::Denied,
                "Aetna",
                DateFixtures::discharge(),
            )
            .expect("valid claim"),
            detail: Some(
                ClaimDetail::new(id, "99213, 80053", Some("Prior authorization missing"))
                    .expect("valid detail"),
            ),
        }
    }

    /// A small mixed set of records, by id ascending
    pub fn sample_records() -> Vec<ClaimRecord> {
        vec![
            ClaimRecord {
                claim: Self::john_doe(),
                detail: None,
            },
            Self::denied_with_detail(),
        ]
    }
}

/// Fixture for dates
pub struct DateFixtures;

impl DateFixtures {
    /// Discharge date of the fixture claims (Jan 15, 2025)
    pub fn discharge() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).expect("valid date")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_records_are_ordered() {
        let records = ClaimFixtures::sample_records();
        assert!(records[0].claim.id < records[1].claim.id);
        assert_eq!(records[1].claim.underpayment(), dec!(980.00));
    }
}
