//! Command-line interface definition.

use clap::{Parser, Subcommand};
use cu_settlement::SettlementConfig;
use std::path::PathBuf;

/// Replay CU tracking and monthly settlement scenarios.
#[derive(Parser, Debug)]
#[command(name = "cu-settle")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, short, env = "CU_SETTLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the per-CU token limit.
    #[arg(long, env = "CU_SETTLE_TOKEN_PER_CU_LIMIT")]
    pub token_per_cu_limit: Option<u64>,

    /// Override the max reward boost.
    #[arg(long, env = "CU_SETTLE_MAX_REWARD_BOOST")]
    pub max_reward_boost: Option<u64>,

    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON.
    #[arg(long)]
    pub json_logs: bool,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a scenario file against a fresh keeper.
    Run {
        /// Scenario file (TOML).
        #[arg(long, short)]
        scenario: PathBuf,

        /// Load keeper state from, and save it back to, the configured state path.
        #[arg(long)]
        persist: bool,
    },

    /// Write the default configuration to a file.
    InitConfig {
        /// Output path.
        #[arg(long, short)]
        output: PathBuf,
    },
}

impl Cli {
    /// Build the configuration from the config file and CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn load_config(&self) -> color_eyre::Result<SettlementConfig> {
        let mut config = if let Some(ref path) = self.config {
            SettlementConfig::from_file(path)?
        } else {
            SettlementConfig::default()
        };

        if let Some(limit) = self.token_per_cu_limit {
            config.params.token_per_cu_limit = limit;
        }
        if let Some(boost) = self.max_reward_boost {
            config.params.max_reward_boost = boost;
        }
        config.log_level.clone_from(&self.log_level);

        config.validate()?;
        Ok(config)
    }
}
