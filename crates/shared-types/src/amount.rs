//! # Fixed-Point Amounts
//!
//! Protocol amounts are unsigned 64-bit integers in base units,
//! 1 coin = 10^8 units. Floating point never touches the wire.

use serde::{Deserialize, Serialize};

/// Base units per coin.
pub const COIN: u64 = 100_000_000;

/// A fixed-point amount in base units (1 coin = 10^8 units).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(u64);

impl Amount {
    /// Zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Construct from raw base units.
    pub fn from_units(units: u64) -> Self {
        Self(units)
    }

    /// Construct from a whole number of coins.
    pub fn from_coins(coins: u64) -> Self {
        Self(coins * COIN)
    }

    /// Raw base units.
    pub fn units(&self) -> u64 {
        self.0
    }

    /// Checked addition.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Saturating subtraction.
    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    /// True when the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Little-endian wire form.
    pub fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// Parse from the little-endian wire form.
    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        Amount(iter.map(|a| a.0).sum())
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:08}", self.0 / COIN, self.0 % COIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_conversion() {
        assert_eq!(Amount::from_coins(10).units(), 10 * COIN);
    }

    #[test]
    fn test_display_fixed_point() {
        assert_eq!(Amount::from_units(150_000_000).to_string(), "1.50000000");
        assert_eq!(Amount::from_units(1).to_string(), "0.00000001");
    }

    #[test]
    fn test_wire_roundtrip() {
        let a = Amount::from_units(123_456_789);
        assert_eq!(Amount::from_le_bytes(a.to_le_bytes()), a);
    }

    #[test]
    fn test_checked_math() {
        let a = Amount::from_units(u64::MAX);
        assert!(a.checked_add(Amount::from_units(1)).is_none());
        assert_eq!(
            Amount::from_units(5).checked_sub(Amount::from_units(2)),
            Some(Amount::from_units(3))
        );
        assert!(Amount::from_units(1).checked_sub(Amount::from_units(2)).is_none());
    }

    #[test]
    fn test_sum() {
        let total: Amount = [1u64, 2, 3].iter().map(|&u| Amount::from_units(u)).sum();
        assert_eq!(total.units(), 6);
    }
}
