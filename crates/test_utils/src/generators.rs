//! Property-Based Test Generators
//!
//! Proptest strategies producing claims that satisfy the domain invariants.

use chrono::{Days, NaiveDate};
use core_kernel::{Amount, ClaimId};
use domain_claims::{Claim, ClaimDetail, ClaimRecord, ClaimStatus};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for generating claim statuses
pub fn claim_status_strategy() -> impl Strategy<Value = ClaimStatus> {
    prop_oneof![
        Just(ClaimStatus::Paid),
        Just(ClaimStatus::Denied),
        Just(ClaimStatus::UnderReview),
    ]
}

/// Strategy for generating amounts in the storable range
pub fn amount_strategy() -> impl Strategy<Value = Amount> {
    (0i64..=9_999_999_999i64).prop_map(|cents| {
        Amount::new(Decimal::new(cents, 2)).expect("cents in range")
    })
}

/// Strategy for generating discharge dates between 2000 and 2054
pub fn discharge_date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0u64..20_000).prop_map(|days| {
        NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date") + Days::new(days)
    })
}

/// Strategy for generating person names
///
/// Some names contain the file delimiter, and a few run past the stored
/// length so the cut sometimes lands on the space between the words.
pub fn patient_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        8 => "[A-Z][a-z]{1,10} [A-Z][a-z|'-]{1,12}",
        1 => "[A-Z][a-z]{250,260} [A-Z][a-z]{1,20}",
    ]
}

/// Strategy for generating insurer names
pub fn insurer_name_strategy() -> impl Strategy<Value = String> {
    "[A-Z][A-Za-z&]{2,15}( [A-Z][a-z]{2,10})?"
}

/// Strategy for generating a claim with the given id
pub fn claim_strategy(id: ClaimId) -> impl Strategy<Value = Claim> {
    (
        patient_name_strategy(),
        amount_strategy(),
        amount_strategy(),
        claim_status_strategy(),
        insurer_name_strategy(),
        discharge_date_strategy(),
    )
        .prop_map(move |(patient, billed, paid, status, insurer, date)| {
            Claim::new(id, &patient, billed, paid, status, &insurer, date)
                .expect("generated claim is valid")
        })
}

/// Strategy for generating an optional detail for a claim id
pub fn detail_strategy(id: ClaimId) -> impl Strategy<Value = Option<ClaimDetail>> {
    proptest::option::of((
        "[0-9]{5}(, [0-9]{5}){0,3}",
        proptest::option::of("[A-Za-z][A-Za-z ,.|\"]{0,40}[a-z]"),
    ))
    .prop_map(move |detail| {
        detail.map(|(codes, reason)| {
            ClaimDetail::new(id, &codes, reason.as_deref()).expect("generated detail is valid")
        })
    })
}

/// Strategy for generating a record with a random id
pub fn claim_record_strategy() -> impl Strategy<Value = ClaimRecord> {
    (1i64..1_000_000)
        .prop_map(|id| ClaimId::new(id).expect("positive id"))
        .prop_flat_map(|id| {
            (claim_strategy(id), detail_strategy(id))
                .prop_map(|(claim, detail)| ClaimRecord { claim, detail })
        })
}

/// Strategy for generating records with distinct ids, by id ascending
pub fn unique_records_strategy(max: usize) -> impl Strategy<Value = Vec<ClaimRecord>> {
    proptest::collection::btree_set(1i64..1_000_000, 0..=max).prop_flat_map(|ids| {
        ids.into_iter()
            .map(|id| {
                let id = ClaimId::new(id).expect("positive id");
                (claim_strategy(id), detail_strategy(id))
                    .prop_map(|(claim, detail)| ClaimRecord { claim, detail })
            })
            .collect::<Vec<_>>()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn unique_records_are_sorted(records in unique_records_strategy(10)) {
            let ids: Vec<i64> = records.iter().map(|r| r.claim.id.value()).collect();
            let mut sorted = ids.clone();
            sorted.sort_unstable();
            sorted.dedup();
            prop_assert_eq!(ids, sorted);
        }

        #[test]
        fn names_survive_a_second_trim(name in patient_name_strategy()) {
            let claim = Claim::new(
                ClaimId::new(1).expect("positive id"),
                &name,
                Amount::zero(),
                Amount::zero(),
                ClaimStatus::Paid,
                "Aetna",
                NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date"),
            )
            .expect("generated claim is valid");
            prop_assert_eq!(claim.patient_name.trim(), claim.patient_name.as_str());
        }

        #[test]
        fn details_belong_to_their_claim(record in claim_record_strategy()) {
            if let Some(detail) = &record.detail {
                prop_assert_eq!(detail.claim_id, record.claim.id);
            }
        }
    }
}
