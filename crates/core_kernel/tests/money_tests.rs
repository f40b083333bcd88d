//! Unit tests for the Amount type
//!
//! Tests cover construction, parsing of loosely formatted input,
//! bounds and precision checks, and serialization.

use core_kernel::{Amount, AmountError};
use core_kernel::money::MAX_AMOUNT;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_pads_to_two_places() {
        let amount = Amount::new(dec!(100)).unwrap();
        assert_eq!(amount.to_string(), "100.00");
    }

    #[test]
    fn test_new_accepts_trailing_zeros_beyond_scale() {
        let amount = Amount::new(dec!(1.500)).unwrap();
        assert_eq!(amount.value(), dec!(1.50));
    }

    #[test]
    fn test_new_rejects_three_significant_places() {
        assert_eq!(
            Amount::new(dec!(1.005)),
            Err(AmountError::TooPrecise(dec!(1.005)))
        );
    }

    #[test]
    fn test_new_accepts_maximum() {
        assert!(Amount::new(MAX_AMOUNT).is_ok());
    }

    #[test]
    fn test_new_rejects_above_maximum() {
        assert!(matches!(
            Amount::new(dec!(100000000.00)),
            Err(AmountError::TooLarge(_))
        ));
    }

    #[test]
    fn test_zero_is_valid() {
        let amount = Amount::new(dec!(0)).unwrap();
        assert!(amount.is_zero());
        assert_eq!(amount, Amount::zero());
    }
}

mod parsing {
    use super::*;

    #[test]
    fn test_parse_plain_decimal() {
        assert_eq!(Amount::parse("15000.50").unwrap().value(), dec!(15000.50));
    }

    #[test]
    fn test_parse_strips_currency_and_separators() {
        assert_eq!(Amount::parse("$1,234.56").unwrap().value(), dec!(1234.56));
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert_eq!(Amount::parse("   "), Err(AmountError::Empty));
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(matches!(Amount::parse("abc"), Err(AmountError::NotANumber(_))));
    }

    #[test]
    fn test_parse_scientific_notation() {
        assert_eq!(Amount::parse("1.5e3").unwrap().value(), dec!(1500.00));
    }

    #[test]
    fn test_parse_negative_is_error() {
        assert!(matches!(Amount::parse("-0.01"), Err(AmountError::Negative(_))));
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_difference_can_be_negative() {
        let billed = Amount::parse("100.00").unwrap();
        let paid = Amount::parse("150.00").unwrap();
        assert_eq!(billed.difference(&paid), dec!(-50.00));
    }
}

mod serialization {
    use super::*;

    #[test]
    fn test_serializes_as_string() {
        let amount = Amount::parse("12000").unwrap();
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"12000.00\"");
    }

    #[test]
    fn test_deserialize_rejects_negative() {
        let result: Result<Amount, _> = serde_json::from_str("\"-5.00\"");
        assert!(result.is_err());
    }
}

proptest! {
    #[test]
    fn prop_cents_always_roundtrip_through_text(cents in 0i64..=9_999_999_999i64) {
        let value = Decimal::new(cents, 2);
        let amount = Amount::new(value).unwrap();
        let reparsed = Amount::parse(&amount.to_string()).unwrap();
        prop_assert_eq!(amount, reparsed);
    }
}
