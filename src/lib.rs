//! Compute-unit tracking and monthly reward settlement.
//!
//! Consumers prepay credit for a subscription. While the month runs, every
//! relay payment adds the compute units (CU) a provider served to a
//! versioned tracker and accrues a reward-boost adjustment. When the month
//! ends the subscription's credit snapshot is split among the providers in
//! proportion to their CU, capped per CU, and paid out through the host's
//! staking and delegation modules.
//!
//! # Architecture
//!
//! ```text
//!  relay payments                      month-end timer
//!        │                                   │
//!        ▼                                   ▼
//! ┌──────────────┐   ┌──────────────┐  ┌──────────────┐   ┌───────────────┐
//! │  CuTracker   │◄──┤    Keeper    ├─►│  settlement  ├──►│ RewardGateway │
//! └──────┬───────┘   └──────┬───────┘  └──────────────┘   └───────────────┘
//!        ▼                  ▼
//! ┌──────────────┐   ┌───────────────────┐
//! │VersionedStore│   │ AdjustmentManager │
//! └──────────────┘   └───────────────────┘
//! ```
//!
//! Everything runs synchronously inside block processing and must produce
//! identical results on every replica: integer arithmetic only, ordered
//! maps only, no I/O besides the optional state snapshot.

pub mod address;
pub mod adjustment;
pub mod config;
pub mod error;
pub mod event;
pub mod gateway;
pub mod settlement;
pub mod store;
pub mod tracker;
pub mod types;

pub use address::ProviderAddress;
pub use adjustment::{AdjustmentFactor, AdjustmentManager};
pub use config::{SettlementConfig, SettlementParams};
pub use error::{Error, Result};
pub use event::{EventLog, SettlementEvent};
pub use gateway::{DistributionError, MemoryGateway, ProviderStake, RewardGateway};
pub use settlement::{Keeper, SettlementSummary, SettlementTrigger};
pub use store::VersionedStore;
pub use tracker::{CuTracker, TrackedCuInfo};
pub use types::{Amount, Coin, CuTrackerTimerData, Subscription, TrackedCu};
