//! Core value types shared by the tracker, the stores and the settlement engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token amount in the smallest denomination unit.
pub type Amount = u128;

/// An amount of a single token denomination.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Coin {
    /// Token denomination (e.g. `ulava`).
    pub denom: String,
    /// Amount in the smallest unit.
    pub amount: Amount,
}

impl Coin {
    /// Create a new coin.
    #[must_use]
    pub fn new(denom: impl Into<String>, amount: Amount) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// A consumer subscription as seen by the settlement engine.
///
/// Only the remaining credit is read and written here; plan changes, renewals
/// and top-ups belong to the subscription lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Consumer account that owns the subscription.
    pub consumer: String,
    /// Block at which the subscription (or its current month) started.
    pub block: u64,
    /// Remaining prepaid credit.
    pub credit: Coin,
}

/// Tracked CU counter stored per (subscription, provider, chain).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackedCu {
    /// Accumulated compute units.
    pub cu: u64,
}

/// Payload carried by the CU tracker timer.
///
/// `credit` is the credit snapshot taken when the month ended; it is the
/// basis of the reward pool, not the live subscription credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuTrackerTimerData {
    /// Subscription block that identifies the month being settled.
    pub block: u64,
    /// Credit snapshot for the month.
    pub credit: Coin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_display() {
        let coin = Coin::new("ulava", 1500);
        assert_eq!(coin.to_string(), "1500ulava");
        assert!(!coin.is_zero());
        assert!(Coin::new("ulava", 0).is_zero());
    }
}
