//! Strongly-typed identifiers for domain entities
//!
//! Claims carry the positive integer identifier assigned by the upstream
//! billing system, so `ClaimId` wraps an `i64`. Flags and notes are created
//! by this service and use newtype wrappers around UUIDs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

/// Identifier of a claim
///
/// Always strictly positive. The value is assigned by the source system and
/// never changes once the claim exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ClaimId(i64);

impl ClaimId {
    /// Creates a claim identifier, rejecting zero and negative values
    pub fn new(value: i64) -> Result<Self, CoreError> {
        if value <= 0 {
            return Err(CoreError::invalid_identifier(format!(
                "claim id must be positive, got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    /// Returns the underlying integer
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClaimId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| CoreError::invalid_identifier(format!("'{}' is not an integer", s)))?;
        Self::new(value)
    }
}

impl TryFrom<i64> for ClaimId {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ClaimId> for i64 {
    fn from(id: ClaimId) -> i64 {
        id.0
    }
}

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new time-ordered identifier (v7)
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Returns the identifier prefix for display
            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid_str = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(uuid_str)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

define_id!(FlagId, "FLG");
define_id!(NoteId, "NOTE");
