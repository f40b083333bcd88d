//! Unit tests for the Identifiers module

use core_kernel::{ClaimId, FlagId, NoteId};
use uuid::Uuid;

mod claim_id_tests {
    use super::*;

    #[test]
    fn test_new_accepts_positive_values() {
        let id = ClaimId::new(99001).unwrap();
        assert_eq!(id.value(), 99001);
    }

    #[test]
    fn test_new_rejects_zero_and_negative() {
        assert!(ClaimId::new(0).is_err());
        assert!(ClaimId::new(-1).is_err());
    }

    #[test]
    fn test_display_is_plain_number() {
        let id = ClaimId::new(42).unwrap();
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_from_str_trims_whitespace() {
        let id: ClaimId = " 1234 ".parse().unwrap();
        assert_eq!(id.value(), 1234);
    }

    #[test]
    fn test_from_str_rejects_decimals() {
        assert!("12.5".parse::<ClaimId>().is_err());
        assert!("abc".parse::<ClaimId>().is_err());
    }

    #[test]
    fn test_ordering_follows_value() {
        let low = ClaimId::new(1).unwrap();
        let high = ClaimId::new(2).unwrap();
        assert!(low < high);
    }

    #[test]
    fn test_serde_roundtrip_as_integer() {
        let id = ClaimId::new(77).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "77");

        let back: ClaimId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_serde_rejects_non_positive() {
        let result: Result<ClaimId, _> = serde_json::from_str("0");
        assert!(result.is_err());
    }
}

mod flag_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        assert_ne!(FlagId::new(), FlagId::new());
    }

    #[test]
    fn test_prefix() {
        assert_eq!(FlagId::prefix(), "FLG");
    }

    #[test]
    fn test_from_str_with_and_without_prefix() {
        let uuid = Uuid::new_v4();
        let with_prefix: FlagId = format!("FLG-{}", uuid).parse().unwrap();
        let without_prefix: FlagId = uuid.to_string().parse().unwrap();
        assert_eq!(with_prefix, without_prefix);
    }
}

mod note_id_tests {
    use super::*;

    #[test]
    fn test_new_v7_ids_are_time_ordered() {
        let first = NoteId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = NoteId::new();
        let a: Uuid = first.into();
        let b: Uuid = second.into();
        assert!(a < b);
    }

    #[test]
    fn test_display_format() {
        let id = NoteId::new();
        assert!(id.to_string().starts_with("NOTE-"));
    }
}
