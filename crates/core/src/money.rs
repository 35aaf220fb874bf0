//! Monetary amounts in integer minor units.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// A monetary amount in minor units (cents).
///
/// Amounts are a single implicit currency; arithmetic is checked so balances
/// can never silently wrap.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Fails with `InvalidAmount` unless the amount is strictly positive.
    pub fn require_positive(self) -> DomainResult<Self> {
        if self.is_positive() {
            Ok(self)
        } else {
            Err(DomainError::InvalidAmount)
        }
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("monetary amount overflow"))
    }

    pub fn checked_sub(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_sub(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("monetary amount overflow"))
    }

    /// Subtraction floored at zero (used for "remaining principal" figures).
    pub fn saturating_sub_floor_zero(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0).max(0))
    }
}

impl ValueObject for Money {}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        Money(iter.map(|m| m.0).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_positive_rejects_zero_and_negative() {
        assert_eq!(Money::ZERO.require_positive(), Err(DomainError::InvalidAmount));
        assert_eq!(
            Money::from_cents(-1).require_positive(),
            Err(DomainError::InvalidAmount)
        );
        assert_eq!(
            Money::from_cents(1).require_positive(),
            Ok(Money::from_cents(1))
        );
    }

    #[test]
    fn floor_zero_subtraction_never_goes_negative() {
        let principal = Money::from_cents(100_000);
        let repaid = Money::from_cents(150_000);
        assert_eq!(principal.saturating_sub_floor_zero(repaid), Money::ZERO);
    }

    #[test]
    fn display_renders_major_and_minor_units() {
        assert_eq!(Money::from_cents(123_45).to_string(), "123.45");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-250).to_string(), "-2.50");
    }
}
