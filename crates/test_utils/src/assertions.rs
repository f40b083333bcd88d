//! Custom Test Assertions
//!
//! Assertion helpers for import reports and stored records that print the
//! whole report on failure.

use domain_claims::{ClaimRecord, ImportReport, RowError};

/// Asserts the claim counters of an import report
///
/// # Panics
///
/// Panics if any counter differs
pub fn assert_import_counts(report: &ImportReport, inserted: usize, updated: usize, rejected: usize) {
    assert_eq!(
        (report.claims_inserted, report.claims_updated, report.rejected),
        (inserted, updated, rejected),
        "Unexpected import counts (inserted, updated, rejected); report: {:#?}",
        report
    );
}

/// Asserts that a report has exactly one error, for the given row, whose
/// message contains `fragment`, and returns it
pub fn assert_single_row_error<'a>(report: &'a ImportReport, row: usize, fragment: &str) -> &'a RowError {
    assert_eq!(report.errors.len(), 1, "Expected one row error; report: {:#?}", report);
    let error = &report.errors[0];
    assert_eq!(error.row, row, "Row error reported on the wrong row: {}", error);
    assert!(
        error.message.contains(fragment),
        "Row error '{}' does not mention '{}'",
        error.message,
        fragment
    );
    error
}

/// Asserts that two record sets are equal regardless of order
pub fn assert_same_records(actual: &[ClaimRecord], expected: &[ClaimRecord]) {
    let mut actual = actual.to_vec();
    let mut expected = expected.to_vec();
    actual.sort_by_key(|r| r.claim.id);
    expected.sort_by_key(|r| r.claim.id);
    assert_eq!(actual.len(), expected.len(), "Record counts differ");
    for (a, e) in actual.iter().zip(&expected) {
        assert_eq!(a, e, "Record {} differs", e.claim.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ClaimFixtures;

    #[test]
    fn test_same_records_ignores_order() {
        let records = ClaimFixtures::sample_records();
        let mut reversed = records.clone();
        reversed.reverse();
        assert_same_records(&reversed, &records);
    }

    #[test]
    #[should_panic(expected = "Record counts differ")]
    fn test_same_records_detects_missing() {
        let records = ClaimFixtures::sample_records();
        assert_same_records(&records[..1], &records);
    }
}
