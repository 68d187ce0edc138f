//! Monthly CU settlement.
//!
//! Once a subscription month ends, the scheduler fires a CU tracker timer for
//! the subscription. Settling it turns the month's tracked CU into provider
//! rewards:
//!
//! ```text
//! timer(sub, block, credit snapshot)
//!        │
//!        ▼
//! collect tracked CU at block ──── none / zero ──► done
//!        │
//!        ▼
//! pool = credit, capped at token_per_cu_limit × total CU
//!        │
//!        ▼
//! snapshot + clear adjustments (once)
//!        │
//!        ▼
//! per provider: reset entry → share of pool → aggregate → contribute → pay
//!        │
//!        ▼
//! debit subscription credit  (or send the remainder to the validators pool
//!                             if the subscription is gone)
//! ```
//!
//! A failure for one provider never stops the others. Only a malformed
//! trigger or a missing default adjustment factor abort a settlement, and
//! both are detected before any state is changed.

mod reward;
mod trigger;

pub use reward::{calc_total_monthly_reward, cap_reward_pool};
pub use trigger::SettlementTrigger;

use crate::address::ProviderAddress;
use crate::adjustment::{
    adjustment_factor_provider, default_factor, AdjustmentFactor, AdjustmentManager,
};
use crate::config::{SettlementConfig, SettlementParams};
use crate::error::{Error, Result};
use crate::event::{EventLog, SettlementEvent};
use crate::gateway::RewardGateway;
use crate::store::VersionedStore;
use crate::tracker::{CuTracker, TrackedCuInfo};
use crate::types::{Amount, Coin, Subscription};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Outcome of one settlement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlementSummary {
    /// Subscription that was settled.
    pub sub: String,
    /// Total CU tracked for the month.
    pub total_cu: Amount,
    /// Reward pool after the per-CU cap.
    pub reward_pool: Amount,
    /// Sum of the provider shares charged to the subscription.
    pub total_rewarded: Amount,
    /// Truncation leftover (`reward_pool - total_rewarded`).
    pub remainder: Amount,
    /// Entries whose distribution succeeded.
    pub providers_paid: usize,
    /// Entries charged whose distribution failed.
    pub distribution_failures: usize,
    /// Entries skipped without being charged.
    pub skipped: usize,
    /// Subscription credit after the debit, if the subscription exists.
    pub remaining_credit: Option<Amount>,
    /// Amount sent to the validators pool.
    pub sent_to_pool: Amount,
}

impl SettlementSummary {
    fn empty(sub: &str) -> Self {
        Self {
            sub: sub.to_string(),
            ..Self::default()
        }
    }

    /// Returns true if the settlement had nothing to pay.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.total_cu == 0
    }
}

/// Persisted keeper state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct KeeperState {
    cu_tracker: CuTracker,
    adjustments: AdjustmentManager,
    subscriptions: VersionedStore<Subscription>,
}

/// Owner of the tracked CU, the adjustments and the subscription credit.
///
/// All state is held here and passed explicitly; the external side effects
/// go through a [`RewardGateway`] supplied per call.
#[derive(Debug, Clone)]
pub struct Keeper {
    params: SettlementParams,
    state: KeeperState,
    events: EventLog,
}

impl Keeper {
    /// Create an empty keeper.
    #[must_use]
    pub fn new(params: SettlementParams, max_versions: usize) -> Self {
        Self {
            params,
            state: KeeperState {
                cu_tracker: CuTracker::new(max_versions),
                adjustments: AdjustmentManager::new(),
                subscriptions: VersionedStore::with_max_versions(max_versions),
            },
            events: EventLog::new(),
        }
    }

    /// Create an empty keeper from configuration.
    #[must_use]
    pub fn from_config(config: &SettlementConfig) -> Self {
        Self::new(config.params.clone(), config.store.max_versions)
    }

    /// Governance parameters in use.
    #[must_use]
    pub fn params(&self) -> &SettlementParams {
        &self.params
    }

    /// The CU tracker.
    #[must_use]
    pub fn cu_tracker(&self) -> &CuTracker {
        &self.state.cu_tracker
    }

    /// The adjustment accumulators.
    #[must_use]
    pub fn adjustments(&self) -> &AdjustmentManager {
        &self.state.adjustments
    }

    /// Emitted records.
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Take the emitted records.
    pub fn drain_events(&mut self) -> Vec<SettlementEvent> {
        self.events.drain()
    }

    /// Add CU served by `provider` on `chain_id` to the month starting at
    /// `sub_block`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be created.
    pub fn add_tracked_cu(
        &mut self,
        sub: &str,
        provider: &str,
        chain_id: &str,
        cu: u64,
        sub_block: u64,
    ) -> Result<()> {
        self.state
            .cu_tracker
            .add_tracked_cu(sub, provider, chain_id, cu, sub_block)
    }

    /// Accrue the reward-boost adjustment for one payment.
    pub fn append_adjustment(
        &mut self,
        sub: &str,
        provider: &str,
        total_consumer_usage: u64,
        usage_with_provider: u64,
        max_reward_boost: u64,
    ) {
        self.state.adjustments.append_adjustment(
            sub,
            provider,
            total_consumer_usage,
            usage_with_provider,
            max_reward_boost,
        );
    }

    /// Store a subscription version effective from `subscription.block`.
    ///
    /// Writing again at the same block overwrites that version.
    ///
    /// # Errors
    ///
    /// Returns an error if the block is older than the latest version.
    pub fn set_subscription(&mut self, subscription: Subscription) -> Result<()> {
        let consumer = subscription.consumer.clone();
        let block = subscription.block;
        let exists = self
            .state
            .subscriptions
            .find(&consumer, block)
            .is_some_and(|found| found.block == block);

        if exists {
            self.state.subscriptions.modify(&consumer, block, subscription)
        } else {
            self.state.subscriptions.append(&consumer, block, subscription)
        }
    }

    /// Remove the latest subscription version (e.g. on expiry).
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription does not exist.
    pub fn remove_subscription(&mut self, consumer: &str, block: u64) -> Result<()> {
        self.state.subscriptions.delete(consumer, block)
    }

    /// Subscription version effective at `block`.
    #[must_use]
    pub fn subscription(&self, consumer: &str, block: u64) -> Option<&Subscription> {
        self.state
            .subscriptions
            .find(consumer, block)
            .map(|found| found.value)
    }

    /// Timer callback: decode the payload and settle the subscription.
    ///
    /// # Errors
    ///
    /// Returns an error, without touching any state, if the payload is
    /// malformed or the default adjustment factor cannot be derived.
    pub fn reward_and_reset_cu_tracker(
        &mut self,
        gateway: &mut dyn RewardGateway,
        key: &[u8],
        data: &[u8],
        block_height: u64,
    ) -> Result<SettlementSummary> {
        let trigger = SettlementTrigger::decode(key, data).map_err(|e| {
            error!("CU tracker payout failed: {}", e);
            e
        })?;
        self.settle(gateway, &trigger, block_height)
    }

    /// Settle the month identified by `trigger` at `block_height`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZeroMaxRewardBoost`] if a provider has no adjustment
    /// and the max reward boost is zero; no state is changed in that case.
    pub fn settle(
        &mut self,
        gateway: &mut dyn RewardGateway,
        trigger: &SettlementTrigger,
        block_height: u64,
    ) -> Result<SettlementSummary> {
        let sub = trigger.sub.as_str();
        let (tracked_cu_list, total_cu) = self
            .state
            .cu_tracker
            .sub_tracked_cu_info(sub, trigger.data.block);

        if tracked_cu_list.is_empty() || total_cu == 0 {
            debug!("No tracked CU for {} at block {}", sub, trigger.data.block);
            return Ok(SettlementSummary::empty(sub));
        }

        // entries are looked up at the month's block, so plan changes during
        // the month do not affect which entries are settled
        let block = trigger.data.block;

        let reward_pool = cap_reward_pool(
            trigger.data.credit.amount,
            total_cu,
            self.params.token_per_cu_limit,
        );

        let entries = self
            .resolve_adjustments(sub, tracked_cu_list, gateway.max_reward_boost())
            .map_err(|e| {
                warn!("Cannot settle {}: {}", sub, e);
                e
            })?;

        self.state.adjustments.remove_consumer_adjustments(sub);

        let mut summary = SettlementSummary {
            sub: sub.to_string(),
            total_cu,
            reward_pool,
            ..SettlementSummary::default()
        };
        let mut total_rewarded: Amount = 0;

        for (info, adjustment) in &entries {
            let adjustment = *adjustment;
            let provider_addr =
                match ProviderAddress::parse(&info.provider, &self.params.address_prefix) {
                    Ok(addr) => addr,
                    Err(e) => {
                        error!("Skipping tracked CU of {} for {}: {}", info.provider, sub, e);
                        summary.skipped += 1;
                        continue;
                    }
                };

            if let Err(e) = self.state.cu_tracker.reset_cu_tracker(sub, info, block) {
                error!(
                    "Resetting tracked CU failed (provider={}, chain={}, sub={}, tracked_cu={}, block={}): {}",
                    info.provider, info.chain_id, sub, info.tracked_cu, block_height, e
                );
                summary.skipped += 1;
                continue;
            }

            let monthly_reward = calc_total_monthly_reward(reward_pool, info.tracked_cu, total_cu);
            let credit_to_sub = Coin::new(self.params.bond_denom.clone(), monthly_reward);
            total_rewarded += monthly_reward;

            gateway.aggregate_rewards(&info.provider, &info.chain_id, adjustment, monthly_reward);

            let to_distribute =
                match gateway.contribute_to_validators_and_community_pool(monthly_reward) {
                    Ok(left) => left,
                    Err(e) => {
                        error!(
                            "Could not contribute {} to validators and community pool: {}",
                            credit_to_sub, e
                        );
                        monthly_reward
                    }
                };

            match gateway.reward_providers_and_delegators(&provider_addr, &info.chain_id, to_distribute) {
                Ok(provider_reward) => {
                    summary.providers_paid += 1;
                    self.events.emit(
                        SettlementEvent::MonthlyCuTrackerProviderReward {
                            provider: info.provider.clone(),
                            sub: sub.to_string(),
                            tracked_cu: info.tracked_cu,
                            credit_used: credit_to_sub.to_string(),
                            reward: provider_reward,
                            block: block_height,
                            adjustment_raw: adjustment.to_string(),
                        },
                        "Provider got monthly reward successfully",
                    );
                }
                Err(e) if e.is_unstaked() => {
                    summary.distribution_failures += 1;
                    warn!(
                        "Sending provider reward with delegations failed (provider={}, chain={}, block={}): {}",
                        info.provider, info.chain_id, block_height, e
                    );
                }
                Err(e) => {
                    summary.distribution_failures += 1;
                    error!(
                        "Sending provider reward with delegations failed (provider={}, chain={}, sub={}, tracked_cu={}, total_cu={}, block={}): {}",
                        info.provider, info.chain_id, sub, info.tracked_cu, total_cu, block_height, e
                    );
                }
            }
        }

        let remainder = reward_pool.saturating_sub(total_rewarded);
        summary.total_rewarded = total_rewarded;
        summary.remainder = remainder;

        let latest = self
            .state
            .subscriptions
            .find(sub, block_height)
            .map(|found| (found.block, found.value.clone()));

        let credit_remaining = if let Some((latest_block, mut latest_sub)) = latest {
            if latest_sub.credit.amount < total_rewarded {
                warn!(
                    "Providers rewarded more than the subscription credit (sub={}, credit={}, rewarded={})",
                    sub, latest_sub.credit, total_rewarded
                );
                latest_sub.credit.amount = 0;
            } else {
                latest_sub.credit.amount -= total_rewarded;
            }

            let credit = latest_sub.credit.clone();
            summary.remaining_credit = Some(credit.amount);
            if let Err(e) = self
                .state
                .subscriptions
                .modify(sub, latest_block, latest_sub)
            {
                error!("Updating credit of {} failed: {}", sub, e);
            }
            credit
        } else {
            // subscription expired: its leftover goes to the validators
            let coin = Coin::new(self.params.bond_denom.clone(), remainder);
            if !coin.is_zero() {
                match gateway.send_to_pool(&self.params.validators_pool, &coin) {
                    Ok(()) => summary.sent_to_pool = remainder,
                    Err(e) => error!(
                        "Failed sending rewards remainder {} to {}: {}",
                        coin, self.params.validators_pool, e
                    ),
                }
            }
            Coin::new(self.params.bond_denom.clone(), 0)
        };

        self.events.emit(
            SettlementEvent::RemainingCredit {
                sub: sub.to_string(),
                credit_remaining: credit_remaining.to_string(),
                block: block_height,
            },
            "CU tracker reward and reset executed",
        );

        info!(
            "Settled {}: total_cu={}, pool={}, rewarded={}, remainder={}, paid={}, failed={}, skipped={}",
            sub,
            total_cu,
            reward_pool,
            total_rewarded,
            remainder,
            summary.providers_paid,
            summary.distribution_failures,
            summary.skipped
        );

        Ok(summary)
    }

    /// Pair every entry with its adjustment factor.
    ///
    /// Providers without an accumulated adjustment get the default factor,
    /// which is only derived when at least one of them needs it.
    fn resolve_adjustments(
        &self,
        sub: &str,
        tracked_cu_list: Vec<TrackedCuInfo>,
        max_reward_boost: u64,
    ) -> Result<Vec<(TrackedCuInfo, AdjustmentFactor)>> {
        let adjustments = self.state.adjustments.consumer_adjustments(sub);
        let factors = adjustment_factor_provider(&adjustments);

        let mut fallback = None;
        let mut entries = Vec::with_capacity(tracked_cu_list.len());
        for info in tracked_cu_list {
            let factor = match factors.get(&info.provider) {
                Some(factor) => *factor,
                None => match fallback {
                    Some(factor) => factor,
                    None => {
                        let factor = default_factor(max_reward_boost)?;
                        fallback = Some(factor);
                        factor
                    }
                },
            };
            entries.push((info, factor));
        }
        Ok(entries)
    }

    /// Serialize the keeper state.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn export_state(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(&self.state)?)
    }

    /// Replace the keeper state with a previously exported one.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid state snapshot.
    pub fn import_state(&mut self, bytes: &[u8]) -> Result<()> {
        self.state = rmp_serde::from_slice(bytes)?;
        Ok(())
    }

    /// Write the keeper state to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be serialized or written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.export_state()?)?;
        Ok(())
    }

    /// Load keeper state from `path` if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub fn load(&mut self, path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        let bytes = std::fs::read(path)?;
        self.import_state(&bytes).map_err(|e| {
            Error::Codec(format!("invalid state snapshot {}: {e}", path.display()))
        })?;
        Ok(true)
    }
}
