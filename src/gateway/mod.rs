//! Reward distribution gateway.
//!
//! The settlement engine does not move tokens itself. Everything that touches
//! balances, stakes or delegations goes through [`RewardGateway`], which the
//! host state machine implements on top of its staking, delegation and bank
//! modules. [`MemoryGateway`] is a self-contained implementation used by the
//! scenario runner and the tests.

mod memory;

pub use memory::{AggregatedReward, MemoryGateway, ProviderStake, VALIDATORS_CONTRIBUTION_POOL};

use crate::address::ProviderAddress;
use crate::adjustment::AdjustmentFactor;
use crate::types::{Amount, Coin};
use thiserror::Error;

/// Failure reported by the distribution side.
///
/// None of these abort a settlement; they only decide how loudly the failure
/// is logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DistributionError {
    /// The provider has no stake entry on the chain.
    #[error("provider {provider} is not staked on chain {chain_id}")]
    ProviderNotStaked {
        /// Provider address.
        provider: String,
        /// Chain identifier.
        chain_id: String,
    },

    /// No stake storage exists for the chain.
    #[error("stake storage not found for chain {0}")]
    StakeStorageNotFound(String),

    /// Any other transfer failure.
    #[error("transfer failed: {0}")]
    Transfer(String),
}

impl DistributionError {
    /// Returns true for failures caused by the provider no longer being
    /// staked (as opposed to a transfer failure).
    #[must_use]
    pub fn is_unstaked(&self) -> bool {
        matches!(
            self,
            Self::ProviderNotStaked { .. } | Self::StakeStorageNotFound(_)
        )
    }
}

/// Capabilities the settlement engine consumes from the host chain.
pub trait RewardGateway {
    /// Current max reward boost governance parameter (may be zero).
    fn max_reward_boost(&self) -> u64;

    /// Record a provider's monthly reward for bonus-reward bookkeeping.
    fn aggregate_rewards(
        &mut self,
        provider: &str,
        chain_id: &str,
        adjustment: AdjustmentFactor,
        amount: Amount,
    );

    /// Take the validators and community pool share out of `amount`.
    ///
    /// Returns what is left for the provider and its delegators.
    ///
    /// # Errors
    ///
    /// Returns an error if the contribution transfer fails.
    fn contribute_to_validators_and_community_pool(
        &mut self,
        amount: Amount,
    ) -> Result<Amount, DistributionError>;

    /// Pay `amount` to the provider and its delegators.
    ///
    /// Returns the part received by the provider itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is not staked or the transfer fails.
    fn reward_providers_and_delegators(
        &mut self,
        provider: &ProviderAddress,
        chain_id: &str,
        amount: Amount,
    ) -> Result<Amount, DistributionError>;

    /// Move `coin` from the subscription module account to `pool`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer fails.
    fn send_to_pool(&mut self, pool: &str, coin: &Coin) -> Result<(), DistributionError>;
}
