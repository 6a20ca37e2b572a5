//! # Asset Amounts
//!
//! [`Amount`] is a quantity of the single ledger asset, in its smallest
//! indivisible unit. All arithmetic is checked: an overflow is an error,
//! never a wrap.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Basis points in one whole (100%).
pub const BASIS_POINTS_DENOMINATOR: u16 = 10_000;

/// A non-negative quantity of the ledger asset in smallest units.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Wrap a raw quantity.
    pub const fn new(units: u64) -> Self {
        Self(units)
    }

    /// The raw quantity in smallest units.
    pub const fn units(&self) -> u64 {
        self.0
    }

    /// Whether this amount is zero.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::AmountOverflow`] if the sum exceeds `u64::MAX`.
    pub fn checked_add(self, rhs: Amount) -> Result<Amount, ValidationError> {
        self.0
            .checked_add(rhs.0)
            .map(Amount)
            .ok_or(ValidationError::AmountOverflow {
                operation: "add",
                left: self.0,
                right: rhs.0,
            })
    }

    /// Checked subtraction.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::AmountOverflow`] if `rhs` exceeds `self`.
    pub fn checked_sub(self, rhs: Amount) -> Result<Amount, ValidationError> {
        self.0
            .checked_sub(rhs.0)
            .map(Amount)
            .ok_or(ValidationError::AmountOverflow {
                operation: "sub",
                left: self.0,
                right: rhs.0,
            })
    }

    /// The share of this amount at `bps` basis points, rounded down.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidBasisPoints`] if `bps` exceeds 10 000.
    pub fn basis_points(self, bps: u16) -> Result<Amount, ValidationError> {
        if bps > BASIS_POINTS_DENOMINATOR {
            return Err(ValidationError::InvalidBasisPoints(bps));
        }
        // bps <= 10_000 keeps the quotient within u64.
        let share = (self.0 as u128) * (bps as u128) / (BASIS_POINTS_DENOMINATOR as u128);
        Ok(Amount(share as u64))
    }

    /// Sum a sequence of amounts with overflow checking.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::AmountOverflow`] on the first overflowing addition.
    pub fn try_sum<I>(amounts: I) -> Result<Amount, ValidationError>
    where
        I: IntoIterator<Item = Amount>,
    {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, next| acc.checked_add(next))
    }
}

impl From<u64> for Amount {
    fn from(units: u64) -> Self {
        Self(units)
    }
}

impl std::str::FromStr for Amount {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Amount)
            .map_err(|_| ValidationError::InvalidAmount(s.to_string()))
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn checked_add_overflow_is_error() {
        let err = Amount::new(u64::MAX).checked_add(Amount::new(1)).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::AmountOverflow {
                operation: "add",
                ..
            }
        ));
    }

    #[test]
    fn checked_sub_underflow_is_error() {
        assert!(Amount::new(5).checked_sub(Amount::new(6)).is_err());
        assert_eq!(
            Amount::new(6).checked_sub(Amount::new(5)).unwrap(),
            Amount::new(1)
        );
    }

    #[test]
    fn basis_points_rounds_down() {
        assert_eq!(Amount::new(500).basis_points(0).unwrap(), Amount::ZERO);
        assert_eq!(Amount::new(500).basis_points(50).unwrap(), Amount::new(2));
        assert_eq!(
            Amount::new(500).basis_points(10_000).unwrap(),
            Amount::new(500)
        );
    }

    #[test]
    fn basis_points_rejects_over_one_hundred_percent() {
        assert!(matches!(
            Amount::new(1).basis_points(10_001),
            Err(ValidationError::InvalidBasisPoints(10_001))
        ));
    }

    #[test]
    fn parse_rejects_negative_and_garbage() {
        assert!("-5".parse::<Amount>().is_err());
        assert!("1.5".parse::<Amount>().is_err());
        assert_eq!("1500".parse::<Amount>().unwrap(), Amount::new(1500));
    }

    #[test]
    fn try_sum_of_empty_is_zero() {
        assert_eq!(Amount::try_sum(Vec::new()).unwrap(), Amount::ZERO);
    }

    #[test]
    fn serializes_as_bare_integer() {
        assert_eq!(serde_json::to_string(&Amount::new(42)).unwrap(), "42");
    }

    proptest! {
        #[test]
        fn fee_never_exceeds_amount(units in any::<u64>(), bps in 0u16..=10_000) {
            let amount = Amount::new(units);
            let fee = amount.basis_points(bps).unwrap();
            prop_assert!(fee <= amount);
        }
    }
}
