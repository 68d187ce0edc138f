//! Configuration for cu-settlement.

use crate::store::DEFAULT_MAX_VERSIONS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default cap on the tokens paid per tracked CU.
pub const DEFAULT_TOKEN_PER_CU_LIMIT: u64 = 100;

/// Settlement engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Where the keeper state snapshot is kept between runs.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Governance parameters used during settlement.
    #[serde(default)]
    pub params: SettlementParams,

    /// Versioned store configuration.
    #[serde(default)]
    pub store: StoreConfig,
}

/// Governance parameters consumed by the settlement engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementParams {
    /// Maximum tokens paid per tracked CU.
    #[serde(default = "default_token_per_cu_limit")]
    pub token_per_cu_limit: u64,

    /// Max reward boost for small-share providers (zero disables the default
    /// adjustment factor).
    #[serde(default = "default_max_reward_boost")]
    pub max_reward_boost: u64,

    /// Bond denomination rewards are paid in.
    #[serde(default = "default_bond_denom")]
    pub bond_denom: String,

    /// Pool receiving the reward remainder of expired subscriptions.
    #[serde(default = "default_validators_pool")]
    pub validators_pool: String,

    /// Human-readable prefix of provider account addresses.
    #[serde(default = "default_address_prefix")]
    pub address_prefix: String,

    /// Percentage of each provider reward contributed to the validators and
    /// community pool.
    #[serde(default)]
    pub contribution_percent: u64,
}

/// Versioned store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Versions retained per key.
    #[serde(default = "default_max_versions")]
    pub max_versions: usize,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            log_level: default_log_level(),
            params: SettlementParams::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Default for SettlementParams {
    fn default() -> Self {
        Self {
            token_per_cu_limit: default_token_per_cu_limit(),
            max_reward_boost: default_max_reward_boost(),
            bond_denom: default_bond_denom(),
            validators_pool: default_validators_pool(),
            address_prefix: default_address_prefix(),
            contribution_percent: 0,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_versions: default_max_versions(),
        }
    }
}

fn default_state_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "cu-settlement")
        .map(|dirs| dirs.data_dir().join("state.msgpack"))
        .unwrap_or_else(|| PathBuf::from(".cu-settlement/state.msgpack"))
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_token_per_cu_limit() -> u64 {
    DEFAULT_TOKEN_PER_CU_LIMIT
}

const fn default_max_reward_boost() -> u64 {
    5
}

fn default_bond_denom() -> String {
    "ulava".to_string()
}

fn default_validators_pool() -> String {
    "validators_rewards_distribution_pool".to_string()
}

fn default_address_prefix() -> String {
    "lava".to_string()
}

const fn default_max_versions() -> usize {
    DEFAULT_MAX_VERSIONS
}

impl SettlementConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check values that cannot be expressed through serde defaults.
    ///
    /// A zero `max_reward_boost` is accepted here: it is a governance value
    /// and is only fatal when a settlement needs the default factor.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is out of range.
    pub fn validate(&self) -> crate::Result<()> {
        if self.params.contribution_percent > 100 {
            return Err(crate::Error::Config(format!(
                "contribution_percent must be at most 100, got {}",
                self.params.contribution_percent
            )));
        }
        if self.store.max_versions == 0 {
            return Err(crate::Error::Config(
                "store.max_versions must be at least 1".to_string(),
            ));
        }
        if self.params.bond_denom.is_empty() {
            return Err(crate::Error::Config("bond_denom must not be empty".to_string()));
        }
        Ok(())
    }
}
