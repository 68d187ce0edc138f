//! Reward-boost adjustments.
//!
//! Each relay payment a consumer makes with a provider feeds an accumulator
//! for the (consumer, provider) pair. Providers that serve a small share of a
//! consumer's traffic get a boost of up to `max_reward_boost`; the resulting
//! adjustment factor is `clamp(share, 1 / max_reward_boost, 1)` averaged over
//! the month, weighted by the consumer's total usage per payment.
//!
//! The accumulators are read once and removed for the whole subscription at
//! settlement.

use crate::error::{Error, Result};
use crate::store::key::{adjustment_key, decode_adjustment_key, subscription_prefix};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Number of decimal places of an [`AdjustmentFactor`].
pub const FACTOR_PRECISION: u32 = 18;

/// Fixed-point scale of an [`AdjustmentFactor`] (`10^18`).
pub const FACTOR_SCALE: u128 = 10u128.pow(FACTOR_PRECISION);

/// Reward adjustment factor in `(0, 1]`, stored as an 18-decimal fixed-point
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AdjustmentFactor(u128);

impl AdjustmentFactor {
    /// The factor `1`.
    pub const ONE: Self = Self(FACTOR_SCALE);

    /// `numerator / denominator`, truncated to 18 decimals.
    ///
    /// Returns `None` if the denominator is zero or the ratio is outside
    /// `(0, 1]`.
    #[must_use]
    pub fn from_ratio(numerator: u128, denominator: u128) -> Option<Self> {
        if denominator == 0 || numerator == 0 || numerator > denominator {
            return None;
        }
        let scaled = mul_div(numerator, FACTOR_SCALE, denominator);
        (scaled > 0).then_some(Self(scaled))
    }

    /// Raw fixed-point value (scaled by [`FACTOR_SCALE`]).
    #[must_use]
    pub fn raw(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for AdjustmentFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:0width$}",
            self.0 / FACTOR_SCALE,
            self.0 % FACTOR_SCALE,
            width = FACTOR_PRECISION as usize
        )
    }
}

/// Default factor for providers with no accumulated adjustment.
///
/// # Errors
///
/// Returns [`Error::ZeroMaxRewardBoost`] if `max_reward_boost` is zero.
pub fn default_factor(max_reward_boost: u64) -> Result<AdjustmentFactor> {
    if max_reward_boost == 0 {
        return Err(Error::ZeroMaxRewardBoost);
    }
    AdjustmentFactor::from_ratio(1, u128::from(max_reward_boost)).ok_or(Error::ZeroMaxRewardBoost)
}

/// Accumulated usage of one (consumer, provider) pair during the month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Adjustment {
    /// Sum of `max(usage_with_provider, total_usage / max_boost)`, scaled by
    /// [`FACTOR_SCALE`].
    pub adjusted_usage: u128,
    /// Sum of the consumer's total usage per payment.
    pub total_usage: u128,
}

impl Adjustment {
    /// The factor this accumulator resolves to, if any usage was recorded.
    #[must_use]
    pub fn factor(&self) -> Option<AdjustmentFactor> {
        if self.total_usage == 0 {
            return None;
        }
        let raw = (self.adjusted_usage / self.total_usage).min(FACTOR_SCALE);
        (raw > 0).then_some(AdjustmentFactor(raw))
    }
}

/// Per-subscription adjustment accumulators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentManager {
    entries: BTreeMap<String, Adjustment>,
}

impl AdjustmentManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one payment of `sub` with `provider`.
    ///
    /// `total_consumer_usage` is the CU the consumer spent across all
    /// providers in the payment's epoch, `usage_with_provider` the part of it
    /// served by `provider`. Accrual is skipped if `max_reward_boost` is zero.
    pub fn append_adjustment(
        &mut self,
        sub: &str,
        provider: &str,
        total_consumer_usage: u64,
        usage_with_provider: u64,
        max_reward_boost: u64,
    ) {
        if max_reward_boost == 0 {
            warn!(
                "Max reward boost is zero, skipping adjustment (sub={}, provider={})",
                sub, provider
            );
            return;
        }
        if total_consumer_usage == 0 {
            return;
        }

        let total = u128::from(total_consumer_usage);
        let usage = u128::from(usage_with_provider.min(total_consumer_usage));
        let floor = total * FACTOR_SCALE / u128::from(max_reward_boost);
        let adjusted = (usage * FACTOR_SCALE).max(floor);

        let entry = self.entries.entry(adjustment_key(sub, provider)).or_default();
        entry.adjusted_usage = entry.adjusted_usage.saturating_add(adjusted);
        entry.total_usage = entry.total_usage.saturating_add(total);

        debug!(
            "Appended adjustment (sub={}, provider={}, usage={}/{})",
            sub, provider, usage_with_provider, total_consumer_usage
        );
    }

    /// All accumulators of `sub`, keyed by provider.
    #[must_use]
    pub fn consumer_adjustments(&self, sub: &str) -> BTreeMap<String, Adjustment> {
        let prefix = subscription_prefix(sub);
        self.entries
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, adjustment)| {
                decode_adjustment_key(key).map(|(_, provider)| (provider.to_string(), *adjustment))
            })
            .collect()
    }

    /// Remove every accumulator of `sub`.
    pub fn remove_consumer_adjustments(&mut self, sub: &str) {
        let prefix = subscription_prefix(sub);
        self.entries.retain(|key, _| !key.starts_with(&prefix));
    }

    /// Check if no adjustment is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve accumulators into per-provider factors.
#[must_use]
pub fn adjustment_factor_provider(
    adjustments: &BTreeMap<String, Adjustment>,
) -> BTreeMap<String, AdjustmentFactor> {
    adjustments
        .iter()
        .filter_map(|(provider, adjustment)| {
            adjustment.factor().map(|factor| (provider.clone(), factor))
        })
        .collect()
}

/// `floor(a * b / c)`, computed on the full 256-bit product.
///
/// Returns 0 when `c` is zero and saturates at `u128::MAX` when the quotient
/// does not fit.
pub(crate) fn mul_div(a: u128, b: u128, c: u128) -> u128 {
    if c == 0 {
        return 0;
    }
    if let Some(product) = a.checked_mul(b) {
        return product / c;
    }

    let (hi, lo) = widening_mul(a, b);
    if hi >= c {
        return u128::MAX;
    }

    // long division of (hi, lo) by c; hi < c so the quotient fits in 128 bits
    let mut rem = hi;
    let mut quotient: u128 = 0;
    for bit in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> bit) & 1);
        quotient <<= 1;
        if carry == 1 || rem >= c {
            rem = rem.wrapping_sub(c);
            quotient |= 1;
        }
    }
    quotient
}

/// Full product of two `u128` values as `(high, low)` halves.
fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = (1 << 64) - 1;

    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);

    let lo_lo = a_lo * b_lo;
    let lo_hi = a_lo * b_hi;
    let hi_lo = a_hi * b_lo;
    let hi_hi = a_hi * b_hi;

    let mid = (lo_lo >> 64) + (lo_hi & MASK) + (hi_lo & MASK);
    let low = (lo_lo & MASK) | ((mid & MASK) << 64);
    let high = hi_hi + (lo_hi >> 64) + (hi_lo >> 64) + (mid >> 64);
    (high, low)
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::Amount;

    #[test]
    fn test_default_factor() {
        let factor = default_factor(5).expect("factor");
        assert_eq!(factor.to_string(), "0.200000000000000000");
        assert_eq!(default_factor(1).expect("factor"), AdjustmentFactor::ONE);
        assert!(matches!(default_factor(0), Err(Error::ZeroMaxRewardBoost)));
    }

    #[test]
    fn test_from_ratio_bounds() {
        assert!(AdjustmentFactor::from_ratio(0, 5).is_none());
        assert!(AdjustmentFactor::from_ratio(6, 5).is_none());
        assert!(AdjustmentFactor::from_ratio(1, 0).is_none());
        assert_eq!(
            AdjustmentFactor::from_ratio(1, 3).expect("factor").to_string(),
            "0.333333333333333333"
        );
    }

    #[test]
    fn test_small_share_gets_boost_floor() {
        let mut manager = AdjustmentManager::new();
        // provider served 1 of 100 CU, boost 5 → factor floored at 1/5
        manager.append_adjustment("sub", "p1", 100, 1, 5);

        let factors = adjustment_factor_provider(&manager.consumer_adjustments("sub"));
        assert_eq!(factors["p1"], default_factor(5).expect("factor"));
    }

    #[test]
    fn test_large_share_uses_share() {
        let mut manager = AdjustmentManager::new();
        manager.append_adjustment("sub", "p1", 100, 50, 5);
        manager.append_adjustment("sub", "p1", 100, 100, 5);

        let factors = adjustment_factor_provider(&manager.consumer_adjustments("sub"));
        assert_eq!(factors["p1"].to_string(), "0.750000000000000000");
    }

    #[test]
    fn test_zero_boost_skips_accrual() {
        let mut manager = AdjustmentManager::new();
        manager.append_adjustment("sub", "p1", 100, 50, 0);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_remove_consumer_adjustments_is_per_sub() {
        let mut manager = AdjustmentManager::new();
        manager.append_adjustment("sub", "p1", 10, 5, 5);
        manager.append_adjustment("sub", "p2", 10, 5, 5);
        manager.append_adjustment("sub2", "p1", 10, 5, 5);

        assert_eq!(manager.consumer_adjustments("sub").len(), 2);
        manager.remove_consumer_adjustments("sub");
        assert!(manager.consumer_adjustments("sub").is_empty());
        assert_eq!(manager.consumer_adjustments("sub2").len(), 1);
    }

    #[test]
    fn test_mul_div_wide() {
        assert_eq!(mul_div(10, 3, 4), 7);
        assert_eq!(mul_div(10, 3, 0), 0);
        let big = u128::MAX / 2;
        assert_eq!(mul_div(big, 3, 4), big / 4 * 3 + (big % 4) * 3 / 4);
        assert_eq!(mul_div(u128::MAX, u128::MAX, u128::MAX), u128::MAX);
        assert_eq!(mul_div(u128::MAX, 2, 4), u128::MAX / 2);
        assert_eq!(mul_div(u128::MAX, 1, 2), u128::MAX / 2);
        assert_eq!(mul_div(u128::MAX, 3, 2), u128::MAX);
    }

    #[test]
    fn test_mul_div_large_divisor() {
        // b and c both above u64::MAX, where the product overflows u128
        let cu = Amount::from(u64::MAX);
        let total = 2 * cu;
        assert_eq!(mul_div(1_000, cu, total), 500);
        let pool = u128::MAX / 3;
        assert_eq!(mul_div(pool, cu, total), pool / 2);
    }

    #[test]
    fn test_widening_mul() {
        assert_eq!(widening_mul(u128::MAX, u128::MAX), (u128::MAX - 1, 1));
        assert_eq!(widening_mul(1u128 << 64, 1u128 << 64), (1, 0));
        assert_eq!(widening_mul(7, 6), (0, 42));
    }
}
