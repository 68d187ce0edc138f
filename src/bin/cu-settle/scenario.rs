//! Scenario files replayed by `cu-settle run`.
//!
//! A scenario seeds a [`MemoryGateway`] with module funds and provider
//! stakes, then applies an ordered list of steps:
//!
//! ```toml
//! module_funds = 1000000
//!
//! [[stakes]]
//! provider = "lava1qyqszqgpqyqszqgpqyqszqgpqyqszqgpm3xskn"
//! chain_id = "ETH1"
//! self_stake = 1000
//!
//! [[steps]]
//! action = "subscribe"
//! consumer = "lava1qvpsxqcrqvpsxqcrqvpsxqcrqvpsxqcrt9p5hy"
//! block = 100
//! credit = 5000
//!
//! [[steps]]
//! action = "relay"
//! sub = "lava1qvpsxqcrqvpsxqcrqvpsxqcrqvpsxqcrt9p5hy"
//! provider = "lava1qyqszqgpqyqszqgpqyqszqgpqyqszqgpm3xskn"
//! chain_id = "ETH1"
//! cu = 30
//! sub_block = 100
//!
//! [[steps]]
//! action = "settle"
//! sub = "lava1qvpsxqcrqvpsxqcrqvpsxqcrqvpsxqcrt9p5hy"
//! block = 100
//! height = 200
//! ```
//!
//! TOML integers are signed 64-bit, so amounts are read as `u64` and widened.

use cu_settlement::{
    Amount, Coin, CuTrackerTimerData, Keeper, MemoryGateway, ProviderStake, RewardGateway,
    SettlementSummary, SettlementTrigger, Subscription,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{error, info};

/// A parsed scenario.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Scenario {
    /// Initial balance of the subscription module account.
    #[serde(default)]
    pub module_funds: u64,

    /// Provider stakes.
    #[serde(default)]
    pub stakes: Vec<StakeSpec>,

    /// Steps, applied in order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One provider stake.
#[derive(Debug, Clone, Deserialize)]
pub struct StakeSpec {
    /// Provider address.
    pub provider: String,
    /// Chain identifier.
    pub chain_id: String,
    /// Provider's own stake.
    #[serde(default)]
    pub self_stake: u64,
    /// Commission kept from the delegators' share.
    #[serde(default)]
    pub commission_percent: u64,
    /// Delegator address → delegated amount.
    #[serde(default)]
    pub delegations: BTreeMap<String, u64>,
}

/// A scenario step.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Create or overwrite a subscription version.
    Subscribe {
        /// Consumer account.
        consumer: String,
        /// Block the version is effective from.
        block: u64,
        /// Prepaid credit.
        credit: u64,
    },

    /// A relay payment: track CU and accrue the adjustment.
    Relay {
        /// Subscription.
        sub: String,
        /// Serving provider.
        provider: String,
        /// Chain identifier.
        chain_id: String,
        /// CU served.
        cu: u64,
        /// Block of the subscription month.
        sub_block: u64,
        /// Consumer's total usage for the payment; defaults to `cu`.
        total_consumer_usage: Option<u64>,
    },

    /// Fire the month-end timer.
    Settle {
        /// Subscription.
        sub: String,
        /// Block of the month being settled.
        block: u64,
        /// Credit snapshot; defaults to the subscription's credit at `block`.
        credit: Option<u64>,
        /// Block height the timer fires at.
        height: u64,
    },

    /// Remove the latest subscription version.
    Expire {
        /// Consumer account.
        consumer: String,
        /// Block used to locate the version.
        block: u64,
    },

    /// Remove a provider's stake.
    Unstake {
        /// Provider address.
        provider: String,
        /// Chain identifier.
        chain_id: String,
    },
}

impl Scenario {
    /// Read a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> color_eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Build the gateway described by the scenario.
    #[must_use]
    pub fn gateway(&self, max_reward_boost: u64, contribution_percent: u64) -> MemoryGateway {
        let mut gateway = MemoryGateway::new(max_reward_boost, contribution_percent);
        gateway.fund_module(Amount::from(self.module_funds));
        for spec in &self.stakes {
            gateway.stake(
                &spec.provider,
                &spec.chain_id,
                ProviderStake {
                    self_stake: Amount::from(spec.self_stake),
                    commission_percent: spec.commission_percent,
                    delegations: spec
                        .delegations
                        .iter()
                        .map(|(delegator, amount)| (delegator.clone(), Amount::from(*amount)))
                        .collect(),
                },
            );
        }
        gateway
    }

    /// Apply every step, returning the summaries of the settlements that ran.
    ///
    /// Settlement failures are logged and the replay continues, as a timer
    /// failure would not halt block processing.
    ///
    /// # Errors
    ///
    /// Returns an error if a non-settlement step is rejected by the keeper.
    pub fn replay(
        &self,
        keeper: &mut Keeper,
        gateway: &mut MemoryGateway,
    ) -> color_eyre::Result<Vec<SettlementSummary>> {
        let mut summaries = Vec::new();

        for (index, step) in self.steps.iter().enumerate() {
            match step {
                Step::Subscribe {
                    consumer,
                    block,
                    credit,
                } => {
                    let denom = keeper.params().bond_denom.clone();
                    keeper.set_subscription(Subscription {
                        consumer: consumer.clone(),
                        block: *block,
                        credit: Coin::new(denom, Amount::from(*credit)),
                    })?;
                }
                Step::Relay {
                    sub,
                    provider,
                    chain_id,
                    cu,
                    sub_block,
                    total_consumer_usage,
                } => {
                    keeper.add_tracked_cu(sub, provider, chain_id, *cu, *sub_block)?;
                    keeper.append_adjustment(
                        sub,
                        provider,
                        total_consumer_usage.unwrap_or(*cu),
                        *cu,
                        gateway.max_reward_boost(),
                    );
                }
                Step::Settle {
                    sub,
                    block,
                    credit,
                    height,
                } => {
                    let denom = keeper.params().bond_denom.clone();
                    let credit = match credit {
                        Some(amount) => Coin::new(denom, Amount::from(*amount)),
                        None => keeper
                            .subscription(sub, *block)
                            .map_or_else(|| Coin::new(denom, 0), |found| found.credit.clone()),
                    };
                    let trigger = SettlementTrigger::new(
                        sub.clone(),
                        CuTrackerTimerData {
                            block: *block,
                            credit,
                        },
                    );
                    let (key, data) = trigger.encode()?;
                    match keeper.reward_and_reset_cu_tracker(gateway, &key, &data, *height) {
                        Ok(summary) => summaries.push(summary),
                        Err(e) => error!("Step {} (settle {}) failed: {}", index, sub, e),
                    }
                }
                Step::Expire { consumer, block } => {
                    keeper.remove_subscription(consumer, *block)?;
                }
                Step::Unstake { provider, chain_id } => {
                    gateway.unstake(provider, chain_id);
                }
            }
        }

        info!("Replayed {} steps", self.steps.len());
        Ok(summaries)
    }
}
