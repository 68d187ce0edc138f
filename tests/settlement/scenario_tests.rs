//! Month-end settlement scenarios.

#![allow(clippy::expect_used, clippy::panic)]

use super::{TestHarness, CHAIN, MODULE_FUNDS, P1, P2, SUB};
use cu_settlement::gateway::VALIDATORS_CONTRIBUTION_POOL;
use cu_settlement::{Error, SettlementEvent, SettlementParams};

const VALIDATORS_POOL: &str = "validators_rewards_distribution_pool";

/// 30/70 split of an uncapped pool, no remainder.
#[test]
fn test_proportional_rewards() {
    let mut h = TestHarness::default();
    h.subscribe(100, 5_000);
    h.relay(P1, 30, 100);
    h.relay(P2, 70, 100);

    let summary = h.settle(100, 5_000, 200).expect("settle");

    assert_eq!(summary.total_cu, 100);
    assert_eq!(summary.reward_pool, 5_000);
    assert_eq!(summary.total_rewarded, 5_000);
    assert_eq!(summary.remainder, 0);
    assert_eq!(summary.providers_paid, 2);
    assert_eq!(h.gateway.balance(P1), 1_500);
    assert_eq!(h.gateway.balance(P2), 3_500);
    assert_eq!(h.gateway.module_balance(), MODULE_FUNDS - 5_000);
    assert_eq!(h.credit(200), Some(0));
    assert_eq!(h.tracked(P1, 100), 0);
    assert_eq!(h.tracked(P2, 100), 0);
    assert!(h.keeper.cu_tracker().is_empty());
}

/// Credit above the per-CU limit is capped and the rest stays on the subscription.
#[test]
fn test_pool_capped_at_limit() {
    let mut h = TestHarness::default();
    h.subscribe(100, 20_000);
    h.relay(P1, 30, 100);
    h.relay(P2, 70, 100);

    let summary = h.settle(100, 20_000, 200).expect("settle");

    assert_eq!(summary.reward_pool, 10_000);
    assert_eq!(h.gateway.balance(P1), 3_000);
    assert_eq!(h.gateway.balance(P2), 7_000);
    assert_eq!(h.credit(200), Some(10_000));
}

#[test]
fn test_nothing_tracked_changes_nothing() {
    let mut h = TestHarness::default();
    h.subscribe(100, 5_000);

    let summary = h.settle(100, 5_000, 200).expect("settle");

    assert!(summary.is_noop());
    assert_eq!(h.credit(200), Some(5_000));
    assert_eq!(h.gateway.module_balance(), MODULE_FUNDS);
    assert!(h.keeper.events().is_empty());
}

#[test]
fn test_adjustments_cleared_after_settlement() {
    let mut h = TestHarness::default();
    h.subscribe(100, 5_000);
    h.relay(P1, 30, 100);
    assert!(!h.keeper.adjustments().is_empty());

    h.settle(100, 5_000, 200).expect("settle");

    assert!(h.keeper.adjustments().is_empty());
    let aggregated = h.gateway.aggregated();
    assert_eq!(aggregated.len(), 1);
    assert_eq!(aggregated[0].provider, P1);
    assert_eq!(aggregated[0].chain_id, CHAIN);
    assert_eq!(aggregated[0].amount, 3_000);
}

/// Providers are paid from the snapshot even when the live credit is lower.
#[test]
fn test_insufficient_credit_clamps_to_zero() {
    let mut h = TestHarness::default();
    h.subscribe(100, 1_000);
    h.relay(P1, 30, 100);
    h.relay(P2, 70, 100);

    let summary = h.settle(100, 5_000, 200).expect("settle");

    assert_eq!(summary.total_rewarded, 5_000);
    assert_eq!(summary.remaining_credit, Some(0));
    assert_eq!(h.credit(200), Some(0));
    assert_eq!(h.gateway.balance(P1), 1_500);
}

#[test]
fn test_expired_subscription_remainder_goes_to_pool() {
    let mut h = TestHarness::default();
    h.relay(P1, 1, 100);
    h.relay(P2, 2, 100);

    let summary = h.settle(100, 10, 200).expect("settle");

    // floor(10/3) + floor(20/3) = 9
    assert_eq!(summary.total_rewarded, 9);
    assert_eq!(summary.remainder, 1);
    assert_eq!(summary.remaining_credit, None);
    assert_eq!(summary.sent_to_pool, 1);
    assert_eq!(h.gateway.pool(VALIDATORS_POOL), 1);
    assert_eq!(h.gateway.module_balance(), MODULE_FUNDS - 10);
}

#[test]
fn test_expired_subscription_without_remainder() {
    let mut h = TestHarness::default();
    h.relay(P1, 30, 100);
    h.relay(P2, 70, 100);

    let summary = h.settle(100, 5_000, 200).expect("settle");

    assert_eq!(summary.remainder, 0);
    assert_eq!(summary.sent_to_pool, 0);
    assert_eq!(h.gateway.pool(VALIDATORS_POOL), 0);

    let events = h.keeper.events().events();
    assert_eq!(
        events.last(),
        Some(&SettlementEvent::RemainingCredit {
            sub: SUB.to_string(),
            credit_remaining: "0ulava".to_string(),
            block: 200,
        })
    );
}

/// An unstaked provider forfeits its share: the subscription is still charged.
#[test]
fn test_unstaked_provider_still_charged() {
    let mut h = TestHarness::default();
    h.subscribe(100, 5_000);
    h.relay(P1, 30, 100);
    h.relay(P2, 70, 100);
    h.gateway.unstake(P2, CHAIN);

    let summary = h.settle(100, 5_000, 200).expect("settle");

    assert_eq!(summary.providers_paid, 1);
    assert_eq!(summary.distribution_failures, 1);
    assert_eq!(summary.total_rewarded, 5_000);
    assert_eq!(h.credit(200), Some(0));
    assert_eq!(h.gateway.balance(P2), 0);
    assert_eq!(h.gateway.module_balance(), MODULE_FUNDS - 1_500);
    assert_eq!(h.tracked(P2, 100), 0);
}

#[test]
fn test_second_settlement_is_noop() {
    let mut h = TestHarness::default();
    h.subscribe(100, 5_000);
    h.relay(P1, 30, 100);

    h.settle(100, 5_000, 200).expect("settle");
    let credit = h.credit(200);
    let events = h.keeper.events().len();

    let summary = h.settle(100, 5_000, 201).expect("settle again");

    assert!(summary.is_noop());
    assert_eq!(h.credit(200), credit);
    assert_eq!(h.keeper.events().len(), events);
}

/// Settling a month after the next one started leaves the new month alone.
#[test]
fn test_late_settlement_keeps_next_month() {
    let mut h = TestHarness::default();
    h.subscribe(100, 5_000);
    h.relay(P1, 30, 100);
    h.relay(P2, 70, 100);

    h.subscribe(300, 8_000);
    h.relay(P1, 40, 300);

    let summary = h.settle(100, 5_000, 310).expect("settle");

    assert_eq!(summary.total_cu, 100);
    assert_eq!(h.gateway.balance(P1), 1_500);
    assert_eq!(h.tracked(P1, 300), 40);
    assert_eq!(h.credit(310), Some(3_000));
    assert_eq!(h.credit(100), Some(5_000));
}

#[test]
fn test_malformed_provider_skipped() {
    let mut h = TestHarness::default();
    h.subscribe(100, 5_000);
    h.relay(P1, 30, 100);
    h.relay("cosmos1qyqszqgpqyqszqgpqyqszqgpqyqszqgpjnp7du", 70, 100);

    let summary = h.settle(100, 5_000, 200).expect("settle");

    assert_eq!(summary.total_cu, 100);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.total_rewarded, 1_500);
    assert_eq!(summary.remainder, 3_500);
    assert_eq!(h.credit(200), Some(3_500));
    assert_eq!(
        h.keeper
            .cu_tracker()
            .get_tracked_cu(SUB, "cosmos1qyqszqgpqyqszqgpqyqszqgpqyqszqgpjnp7du", CHAIN, 100)
            .0,
        70
    );
}

#[test]
fn test_zero_boost_aborts_settlement() {
    let params = SettlementParams {
        max_reward_boost: 0,
        ..SettlementParams::default()
    };
    let mut h = TestHarness::with_params(params, 0);
    h.subscribe(100, 5_000);
    h.relay(P1, 30, 100);

    let err = h.settle(100, 5_000, 200).expect_err("zero boost");

    assert!(matches!(err, Error::ZeroMaxRewardBoost));
    assert_eq!(h.tracked(P1, 100), 30);
    assert_eq!(h.credit(200), Some(5_000));
    assert_eq!(h.gateway.module_balance(), MODULE_FUNDS);
}

#[test]
fn test_validators_contribution() {
    let mut h = TestHarness::with_params(SettlementParams::default(), 10);
    h.subscribe(100, 5_000);
    h.relay(P1, 30, 100);
    h.relay(P2, 70, 100);

    let summary = h.settle(100, 5_000, 200).expect("settle");

    assert_eq!(summary.total_rewarded, 5_000);
    assert_eq!(h.gateway.balance(P1), 1_350);
    assert_eq!(h.gateway.balance(P2), 3_150);
    assert_eq!(h.gateway.pool(VALIDATORS_CONTRIBUTION_POOL), 500);
    assert_eq!(h.credit(200), Some(0));
}

#[test]
fn test_reward_events() {
    let mut h = TestHarness::default();
    h.subscribe(100, 5_000);
    h.relay(P1, 30, 100);

    h.settle(100, 5_000, 200).expect("settle");

    let names: Vec<&str> = h.keeper.events().events().iter().map(SettlementEvent::name).collect();
    assert_eq!(names, vec!["monthly_cu_tracker_provider_reward", "remaining_credit"]);
    match &h.keeper.events().events()[0] {
        SettlementEvent::MonthlyCuTrackerProviderReward {
            provider,
            tracked_cu,
            credit_used,
            reward,
            ..
        } => {
            assert_eq!(provider, P1);
            assert_eq!(*tracked_cu, 30);
            assert_eq!(credit_used, "3000ulava");
            assert_eq!(*reward, 3_000);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

/// A late-settled month must stay settled after the following month is
/// settled too, even if its timer fires again.
#[test]
fn test_refired_old_month_after_next_month_settled() {
    let mut h = TestHarness::default();
    h.subscribe(100, 5_000);
    h.relay(P1, 30, 100);
    h.subscribe(300, 8_000);
    h.relay(P1, 40, 300);

    let first = h.settle(100, 5_000, 310).expect("settle first month");
    assert_eq!(first.total_cu, 30);
    assert_eq!(h.gateway.balance(P1), 3_000);
    assert_eq!(h.tracked(P1, 100), 0);
    assert_eq!(h.tracked(P1, 300), 40);

    let second = h.settle(300, 8_000, 510).expect("settle second month");
    assert_eq!(second.total_cu, 40);
    assert_eq!(h.gateway.balance(P1), 7_000);
    assert!(h.keeper.cu_tracker().is_empty());
    let credit = h.credit(510);
    let events = h.keeper.events().len();

    let refired = h.settle(100, 5_000, 520).expect("settle first month again");

    assert!(refired.is_noop());
    assert_eq!(h.gateway.balance(P1), 7_000);
    assert_eq!(h.credit(520), credit);
    assert_eq!(h.keeper.events().len(), events);
}

/// Counters near `u64::MAX` must not push the payout above the pool.
#[test]
fn test_saturated_counters_stay_within_pool() {
    let mut h = TestHarness::default();
    h.subscribe(100, 1_000);
    h.relay(P1, u64::MAX, 100);
    h.relay(P2, u64::MAX, 100);

    let summary = h.settle(100, 1_000, 200).expect("settle");

    assert_eq!(summary.total_cu, 2 * u128::from(u64::MAX));
    assert_eq!(summary.reward_pool, 1_000);
    assert_eq!(summary.total_rewarded, 1_000);
    assert_eq!(summary.remainder, 0);
    assert_eq!(h.gateway.balance(P1), 500);
    assert_eq!(h.gateway.balance(P2), 500);
    assert_eq!(h.gateway.module_balance(), MODULE_FUNDS - 1_000);
}

#[test]
fn test_bad_checksum_provider_skipped() {
    // P1 with the last checksum character changed
    const MISTYPED: &str = "lava1qyqszqgpqyqszqgpqyqszqgpqyqszqgpm3xskq";

    let mut h = TestHarness::default();
    h.subscribe(100, 5_000);
    h.relay(P2, 30, 100);
    h.relay(MISTYPED, 70, 100);

    let summary = h.settle(100, 5_000, 200).expect("settle");

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.providers_paid, 1);
    assert_eq!(summary.total_rewarded, 1_500);
    assert_eq!(h.gateway.balance(MISTYPED), 0);
    assert_eq!(h.gateway.balance(P2), 1_500);
    assert_eq!(h.credit(200), Some(3_500));
    assert_eq!(h.tracked(MISTYPED, 100), 70);
}
