//! Settlement event records.
//!
//! Records are buffered in an [`EventLog`] owned by the keeper; the host
//! drains them after each block. They are informational only and are never
//! read back by the engine.

use crate::types::Amount;
use serde::Serialize;
use tracing::info;

/// Records emitted by the settlement engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettlementEvent {
    /// A provider was paid its monthly reward.
    MonthlyCuTrackerProviderReward {
        /// Provider address.
        provider: String,
        /// Subscription (consumer) identifier.
        sub: String,
        /// CU the provider served in the month.
        tracked_cu: u64,
        /// Credit charged to the subscription for this provider.
        credit_used: String,
        /// Amount received by the provider itself.
        reward: Amount,
        /// Block the settlement ran at.
        block: u64,
        /// Adjustment factor applied to the provider.
        adjustment_raw: String,
    },

    /// Credit left on the subscription after settlement.
    RemainingCredit {
        /// Subscription (consumer) identifier.
        sub: String,
        /// Remaining credit (zero if the subscription no longer exists).
        credit_remaining: String,
        /// Block the settlement ran at.
        block: u64,
    },
}

impl SettlementEvent {
    /// Short event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::MonthlyCuTrackerProviderReward { .. } => "monthly_cu_tracker_provider_reward",
            Self::RemainingCredit { .. } => "remaining_credit",
        }
    }
}

/// Ordered buffer of emitted records.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<SettlementEvent>,
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event.
    pub fn emit(&mut self, event: SettlementEvent, description: &str) {
        info!("{}: {:?}", description, event);
        self.events.push(event);
    }

    /// Events recorded so far.
    #[must_use]
    pub fn events(&self) -> &[SettlementEvent] {
        &self.events
    }

    /// Take all recorded events, leaving the log empty.
    pub fn drain(&mut self) -> Vec<SettlementEvent> {
        std::mem::take(&mut self.events)
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
