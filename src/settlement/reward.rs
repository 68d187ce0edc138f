//! Reward arithmetic.
//!
//! All amounts are integers in the smallest denomination; division truncates.

use crate::adjustment::mul_div;
use crate::types::Amount;

/// Cap the month's reward pool at `token_per_cu_limit` tokens per CU.
///
/// The check is made once, on the uncapped pool: if
/// `credit / total_cu > token_per_cu_limit` the pool becomes
/// `token_per_cu_limit * total_cu`, otherwise the whole credit is used.
#[must_use]
pub fn cap_reward_pool(credit: Amount, total_cu: Amount, token_per_cu_limit: u64) -> Amount {
    if total_cu == 0 {
        return 0;
    }
    let limit = Amount::from(token_per_cu_limit);
    if credit / total_cu > limit {
        // credit / total_cu > limit implies limit * total_cu < credit
        limit * total_cu
    } else {
        credit
    }
}

/// A provider's share of the pool: `floor(total_amount * tracked_cu / total_cu)`.
#[must_use]
pub fn calc_total_monthly_reward(
    total_amount: Amount,
    tracked_cu: u64,
    total_cu: Amount,
) -> Amount {
    if total_cu == 0 {
        return 0;
    }
    mul_div(total_amount, Amount::from(tracked_cu), total_cu)
}
