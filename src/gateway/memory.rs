//! In-memory reward gateway.
//!
//! Keeps balances, pools and provider stakes in ordered maps so that every
//! run over the same inputs produces the same ledger.

use super::{DistributionError, RewardGateway};
use crate::address::ProviderAddress;
use crate::adjustment::{mul_div, AdjustmentFactor};
use crate::types::{Amount, Coin};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Name of the pool receiving the validators' contribution.
pub const VALIDATORS_CONTRIBUTION_POOL: &str = "validators_contribution";

/// A provider's stake on one chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderStake {
    /// Stake of the provider itself.
    pub self_stake: Amount,
    /// Percentage of the delegators' share the provider keeps.
    pub commission_percent: u64,
    /// Delegator address → delegated amount.
    pub delegations: BTreeMap<String, Amount>,
}

/// A reward recorded through [`RewardGateway::aggregate_rewards`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedReward {
    /// Provider address.
    pub provider: String,
    /// Chain identifier.
    pub chain_id: String,
    /// Adjustment factor applied to the provider.
    pub adjustment: AdjustmentFactor,
    /// Reward amount.
    pub amount: Amount,
}

/// Deterministic in-memory implementation of [`RewardGateway`].
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    max_reward_boost: u64,
    contribution_percent: u64,
    module_balance: Amount,
    chains: BTreeSet<String>,
    stakes: BTreeMap<(String, String), ProviderStake>,
    balances: BTreeMap<String, Amount>,
    pools: BTreeMap<String, Amount>,
    aggregated: Vec<AggregatedReward>,
}

impl MemoryGateway {
    /// Create a gateway with the given governance parameters.
    ///
    /// `contribution_percent` is capped at 100.
    #[must_use]
    pub fn new(max_reward_boost: u64, contribution_percent: u64) -> Self {
        Self {
            max_reward_boost,
            contribution_percent: contribution_percent.min(100),
            ..Self::default()
        }
    }

    /// Credit the subscription module account (consumers' prepaid funds).
    pub fn fund_module(&mut self, amount: Amount) {
        self.module_balance = self.module_balance.saturating_add(amount);
    }

    /// Register stake storage for a chain.
    pub fn add_chain(&mut self, chain_id: &str) {
        self.chains.insert(chain_id.to_string());
    }

    /// Stake `provider` on `chain_id`, registering the chain if needed.
    pub fn stake(&mut self, provider: &str, chain_id: &str, stake: ProviderStake) {
        self.add_chain(chain_id);
        self.stakes
            .insert((provider.to_string(), chain_id.to_string()), stake);
    }

    /// Remove the stake of `provider` on `chain_id`.
    pub fn unstake(&mut self, provider: &str, chain_id: &str) {
        self.stakes
            .remove(&(provider.to_string(), chain_id.to_string()));
    }

    /// Change the max reward boost parameter.
    pub fn set_max_reward_boost(&mut self, max_reward_boost: u64) {
        self.max_reward_boost = max_reward_boost;
    }

    /// Balance of an account.
    #[must_use]
    pub fn balance(&self, account: &str) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// Balance of a pool.
    #[must_use]
    pub fn pool(&self, pool: &str) -> Amount {
        self.pools.get(pool).copied().unwrap_or_default()
    }

    /// Remaining balance of the subscription module account.
    #[must_use]
    pub fn module_balance(&self) -> Amount {
        self.module_balance
    }

    /// Rewards recorded through `aggregate_rewards`, in call order.
    #[must_use]
    pub fn aggregated(&self) -> &[AggregatedReward] {
        &self.aggregated
    }

    fn debit_module(&mut self, amount: Amount) -> Result<(), DistributionError> {
        self.module_balance = self.module_balance.checked_sub(amount).ok_or_else(|| {
            DistributionError::Transfer(format!(
                "insufficient module balance: have {}, need {amount}",
                self.module_balance
            ))
        })?;
        Ok(())
    }

    fn credit(&mut self, account: &str, amount: Amount) {
        if amount == 0 {
            return;
        }
        let balance = self.balances.entry(account.to_string()).or_default();
        *balance = balance.saturating_add(amount);
    }
}

impl RewardGateway for MemoryGateway {
    fn max_reward_boost(&self) -> u64 {
        self.max_reward_boost
    }

    fn aggregate_rewards(
        &mut self,
        provider: &str,
        chain_id: &str,
        adjustment: AdjustmentFactor,
        amount: Amount,
    ) {
        self.aggregated.push(AggregatedReward {
            provider: provider.to_string(),
            chain_id: chain_id.to_string(),
            adjustment,
            amount,
        });
    }

    fn contribute_to_validators_and_community_pool(
        &mut self,
        amount: Amount,
    ) -> Result<Amount, DistributionError> {
        let contribution = mul_div(amount, u128::from(self.contribution_percent), 100);
        if contribution == 0 {
            return Ok(amount);
        }
        self.debit_module(contribution)?;
        let pool = self
            .pools
            .entry(VALIDATORS_CONTRIBUTION_POOL.to_string())
            .or_default();
        *pool = pool.saturating_add(contribution);
        Ok(amount - contribution)
    }

    fn reward_providers_and_delegators(
        &mut self,
        provider: &ProviderAddress,
        chain_id: &str,
        amount: Amount,
    ) -> Result<Amount, DistributionError> {
        if !self.chains.contains(chain_id) {
            return Err(DistributionError::StakeStorageNotFound(chain_id.to_string()));
        }
        let stake = self
            .stakes
            .get(&(provider.to_string(), chain_id.to_string()))
            .cloned()
            .ok_or_else(|| DistributionError::ProviderNotStaked {
                provider: provider.to_string(),
                chain_id: chain_id.to_string(),
            })?;

        self.debit_module(amount)?;

        let delegated: Amount = stake.delegations.values().sum();
        let total_stake = stake.self_stake.saturating_add(delegated);
        let delegators_share = if total_stake == 0 {
            0
        } else {
            mul_div(amount, delegated, total_stake)
        };
        let commission = mul_div(
            delegators_share,
            u128::from(stake.commission_percent.min(100)),
            100,
        );
        let to_distribute = delegators_share - commission;

        let mut distributed: Amount = 0;
        if delegated > 0 {
            for (delegator, delegation) in &stake.delegations {
                let share = mul_div(to_distribute, *delegation, delegated);
                self.credit(delegator, share);
                distributed += share;
            }
        }

        // truncation dust stays with the provider
        let provider_reward = amount - distributed;
        self.credit(provider.as_str(), provider_reward);

        debug!(
            "Rewarded {} on {}: provider={}, delegators={}",
            provider, chain_id, provider_reward, distributed
        );

        Ok(provider_reward)
    }

    fn send_to_pool(&mut self, pool: &str, coin: &Coin) -> Result<(), DistributionError> {
        self.debit_module(coin.amount)?;
        let balance = self.pools.entry(pool.to_string()).or_default();
        *balance = balance.saturating_add(coin.amount);
        Ok(())
    }
}
