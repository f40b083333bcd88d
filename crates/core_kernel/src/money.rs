//! Monetary amounts with precise decimal arithmetic
//!
//! Claim amounts are stored as `NUMERIC(10,2)`: non-negative, at most two
//! decimal places and at most 99,999,999.99. `Amount` enforces the same
//! constraints at construction so that an invalid value never reaches
//! storage.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Decimal places kept for every amount
pub const AMOUNT_SCALE: u32 = 2;

/// Largest amount representable by the storage column
pub const MAX_AMOUNT: Decimal = dec!(99999999.99);

/// Errors that can occur when constructing an amount
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("'{0}' is not a decimal number")]
    NotANumber(String),

    #[error("negative amount not allowed: {0}")]
    Negative(Decimal),

    #[error("amount {0} exceeds the maximum of {max}", max = MAX_AMOUNT)]
    TooLarge(Decimal),

    #[error("amount {0} has more than {scale} decimal places", scale = AMOUNT_SCALE)]
    TooPrecise(Decimal),
}

/// A non-negative monetary amount with two decimal places
///
/// Serializes as a decimal string (`"15000.50"`) so that no precision is
/// lost in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Creates an amount from a decimal value
    ///
    /// Trailing zeros are ignored when checking precision, so `1.500` is
    /// accepted as `1.50` while `1.005` is rejected.
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value < Decimal::ZERO {
            return Err(AmountError::Negative(value));
        }

        let mut normalized = value.normalize();
        if normalized.scale() > AMOUNT_SCALE {
            return Err(AmountError::TooPrecise(value));
        }
        if normalized > MAX_AMOUNT {
            return Err(AmountError::TooLarge(value));
        }

        normalized.set_sign_positive(true);
        normalized.rescale(AMOUNT_SCALE);
        Ok(Self(normalized))
    }

    /// Parses an amount from free-form text
    ///
    /// Currency symbols (`$`), thousands separators and surrounding
    /// whitespace are stripped before parsing. Scientific notation is
    /// accepted since JSON encoders may emit it for large floats.
    pub fn parse(raw: &str) -> Result<Self, AmountError> {
        let cleaned: String = raw
            .chars()
            .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
            .collect();

        if cleaned.is_empty() {
            return Err(AmountError::Empty);
        }

        let value = Decimal::from_str(&cleaned)
            .or_else(|_| Decimal::from_scientific(&cleaned))
            .map_err(|_| AmountError::NotANumber(raw.trim().to_string()))?;

        Self::new(value)
    }

    /// Creates a zero amount
    pub fn zero() -> Self {
        Self(dec!(0.00))
    }

    /// Returns the decimal value
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Signed difference `self - other`
    pub fn difference(&self, other: &Amount) -> Decimal {
        self.0 - other.0
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Decimal {
        amount.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_keeps_two_places() {
        let amount = Amount::new(dec!(15000.5)).unwrap();
        assert_eq!(amount.to_string(), "15000.50");
        assert_eq!(amount.value().scale(), 2);
    }

    #[test]
    fn test_amount_parse_strips_formatting() {
        let amount = Amount::parse(" $12,000.00 ").unwrap();
        assert_eq!(amount.value(), dec!(12000.00));
    }

    #[test]
    fn test_amount_rejects_negative() {
        assert_eq!(
            Amount::parse("-1.00"),
            Err(AmountError::Negative(dec!(-1.00)))
        );
    }
}
