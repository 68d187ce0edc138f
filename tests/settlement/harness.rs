//! Test harness wiring a keeper to an in-memory gateway.

#![allow(clippy::expect_used)]

use cu_settlement::{
    Amount, Coin, CuTrackerTimerData, Keeper, MemoryGateway, ProviderStake, RewardGateway,
    SettlementParams, SettlementSummary, SettlementTrigger, Subscription,
};

/// First test provider.
pub const P1: &str = "lava1qyqszqgpqyqszqgpqyqszqgpqyqszqgpm3xskn";
/// Second test provider.
pub const P2: &str = "lava1qgpqyqszqgpqyqszqgpqyqszqgpqyqsz24q4a9";
/// Test subscription (consumer).
pub const SUB: &str = "lava1qvpsxqcrqvpsxqcrqvpsxqcrqvpsxqcrt9p5hy";
/// Test chain.
pub const CHAIN: &str = "ETH1";

/// Balance the subscription module account starts with.
pub const MODULE_FUNDS: Amount = 10_000_000;

/// A keeper and a gateway with both test providers staked on [`CHAIN`].
pub struct TestHarness {
    /// Keeper under test.
    pub keeper: Keeper,
    /// Gateway receiving the side effects.
    pub gateway: MemoryGateway,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::with_params(SettlementParams::default(), 0)
    }
}

impl TestHarness {
    /// Harness with custom parameters and validators contribution.
    pub fn with_params(params: SettlementParams, contribution_percent: u64) -> Self {
        let mut gateway = MemoryGateway::new(params.max_reward_boost, contribution_percent);
        gateway.fund_module(MODULE_FUNDS);
        gateway.stake(P1, CHAIN, ProviderStake::default());
        gateway.stake(P2, CHAIN, ProviderStake::default());

        Self {
            keeper: Keeper::new(params, 2),
            gateway,
        }
    }

    /// Store a subscription version with `credit` at `block`.
    pub fn subscribe(&mut self, block: u64, credit: Amount) {
        self.keeper
            .set_subscription(Subscription {
                consumer: SUB.to_string(),
                block,
                credit: Coin::new("ulava", credit),
            })
            .expect("subscribe");
    }

    /// Relay payment of `cu` by `provider` for the month at `sub_block`.
    pub fn relay(&mut self, provider: &str, cu: u64, sub_block: u64) {
        self.keeper
            .add_tracked_cu(SUB, provider, CHAIN, cu, sub_block)
            .expect("track");
        let boost = self.gateway.max_reward_boost();
        self.keeper.append_adjustment(SUB, provider, cu, cu, boost);
    }

    /// Fire the timer for the month at `block` through the encoded payload.
    pub fn settle(
        &mut self,
        block: u64,
        credit: Amount,
        height: u64,
    ) -> cu_settlement::Result<SettlementSummary> {
        let trigger = SettlementTrigger::new(
            SUB,
            CuTrackerTimerData {
                block,
                credit: Coin::new("ulava", credit),
            },
        );
        let (key, data) = trigger.encode().expect("encode");
        self.keeper
            .reward_and_reset_cu_tracker(&mut self.gateway, &key, &data, height)
    }

    /// Credit of the subscription version effective at `block`.
    pub fn credit(&self, block: u64) -> Option<Amount> {
        self.keeper
            .subscription(SUB, block)
            .map(|sub| sub.credit.amount)
    }

    /// Tracked CU of `provider` for the month at `block`.
    pub fn tracked(&self, provider: &str, block: u64) -> u64 {
        self.keeper
            .cu_tracker()
            .get_tracked_cu(SUB, provider, CHAIN, block)
            .0
    }
}
