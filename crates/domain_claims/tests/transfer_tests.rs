//! Import/export tests against the in-memory store
//!
//! Records come from the shared `test_utils` generators and fixtures.

use proptest::prelude::*;
use rust_decimal_macros::dec;

use domain_claims::ports::mock::MockClaimStore;
use domain_claims::{
    export_claims, import_claims, ClaimRecord, ClaimStatus, ClaimStore, ExportFilter, FileFormat,
    ImportFile, ImportMode, ImportRequest,
};
use test_utils::{
    assert_import_counts, assert_same_records, unique_records_strategy, ClaimBuilder,
    ClaimFixtures, SAMPLE_CLAIMS_CSV, SAMPLE_CLAIMS_JSON, SAMPLE_DETAILS_CSV,
};

async fn stored(store: &MockClaimStore) -> Vec<ClaimRecord> {
    store.export_claims(&ExportFilter::default()).await.unwrap()
}

/// Exports `records` in `format` and imports the file into an empty store
async fn round_trip(records: Vec<ClaimRecord>, format: FileFormat) -> Vec<ClaimRecord> {
    let source = MockClaimStore::with_records(records).await;
    let file = export_claims(&source, format, &ExportFilter::default())
        .await
        .unwrap();

    let target = MockClaimStore::new();
    let request = ImportRequest::new(
        ImportFile::new(file.body).with_filename(file.filename),
        ImportMode::Add,
    );
    let report = import_claims(&target, request).await.unwrap();
    assert!(report.errors.is_empty(), "{:?}", report.errors);

    stored(&target).await
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn export_then_import_preserves_records(records in unique_records_strategy(20)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        for format in [FileFormat::Csv, FileFormat::Json] {
            let imported = runtime.block_on(round_trip(records.clone(), format));
            prop_assert_eq!(&imported, &records);
        }
    }
}

#[tokio::test]
async fn test_name_cut_on_a_space_round_trips() {
    let long_name = format!("{} {}", "a".repeat(254), "b".repeat(20));
    let record = ClaimBuilder::new(42)
        .with_patient(long_name)
        .with_status(ClaimStatus::Denied)
        .with_detail("99213", Some("Not covered"))
        .build_record();
    assert_eq!(record.claim.patient_name, "a".repeat(254));

    for format in [FileFormat::Csv, FileFormat::Json] {
        let imported = round_trip(vec![record.clone()], format).await;
        assert_eq!(imported, vec![record.clone()]);
    }
}

#[tokio::test]
async fn test_fixture_records_round_trip() {
    let records = ClaimFixtures::sample_records();
    for format in [FileFormat::Csv, FileFormat::Json] {
        assert_same_records(&round_trip(records.clone(), format).await, &records);
    }
}

#[tokio::test]
async fn test_claims_with_separate_details_file() {
    let store = MockClaimStore::new();
    let request = ImportRequest::new(
        ImportFile::new(SAMPLE_CLAIMS_CSV).with_filename("claims.csv"),
        ImportMode::Add,
    )
    .with_details(ImportFile::new(SAMPLE_DETAILS_CSV).with_filename("claim_details.csv"));
    let report = import_claims(&store, request).await.unwrap();

    assert_import_counts(&report, 3, 0, 0);
    assert_eq!(report.details_inserted, 3);

    let records = stored(&store).await;
    let codes: Vec<Option<&str>> = records
        .iter()
        .map(|r| r.detail.as_ref().map(|d| d.cpt_codes.as_str()))
        .collect();
    assert_eq!(codes, vec![Some("99213"), Some("99214, 80053"), Some("99285, 71045")]);
    assert_eq!(records[1].claim.billed_amount.value(), dec!(8420.10));
}

#[tokio::test]
async fn test_json_array_fixture() {
    let store = MockClaimStore::new();
    let request = ImportRequest::new(
        ImportFile::new(SAMPLE_CLAIMS_JSON).with_filename("claims.json"),
        ImportMode::Add,
    );
    let report = import_claims(&store, request).await.unwrap();

    assert_eq!(report.format, FileFormat::Json);
    assert_import_counts(&report, 2, 0, 0);
    assert_eq!(report.details_inserted, 1);

    let records = stored(&store).await;
    assert_eq!(records[0].claim.billed_amount.value(), dec!(1200.5));
    assert_eq!(records[1].claim.status, ClaimStatus::Denied);
    let detail = records[1].detail.as_ref().unwrap();
    assert_eq!(detail.denial_reason.as_deref(), Some("Out of network"));
}
