//! cu-settle CLI entry point.

mod cli;
mod scenario;

use clap::Parser;
use cli::{Cli, Command};
use cu_settlement::{Keeper, SettlementConfig};
use scenario::Scenario;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    info!("cu-settle v{}", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Command::InitConfig { output } => {
            SettlementConfig::default().to_file(output)?;
            info!("Wrote default configuration to {}", output.display());
        }
        Command::Run { scenario, persist } => {
            let config = cli.load_config()?;
            run(&config, scenario, *persist)?;
        }
    }

    Ok(())
}

fn run(config: &SettlementConfig, path: &std::path::Path, persist: bool) -> color_eyre::Result<()> {
    let scenario = Scenario::from_file(path)?;

    let mut keeper = Keeper::from_config(config);
    if persist && keeper.load(&config.state_path)? {
        info!("Loaded keeper state from {}", config.state_path.display());
    }

    let mut gateway = scenario.gateway(
        config.params.max_reward_boost,
        config.params.contribution_percent,
    );

    let summaries = scenario.replay(&mut keeper, &mut gateway)?;

    for event in keeper.drain_events() {
        println!("{}: {:?}", event.name(), event);
    }
    for summary in &summaries {
        println!(
            "{}: total_cu={} pool={} rewarded={} remainder={} paid={} failed={} skipped={} sent_to_pool={}",
            summary.sub,
            summary.total_cu,
            summary.reward_pool,
            summary.total_rewarded,
            summary.remainder,
            summary.providers_paid,
            summary.distribution_failures,
            summary.skipped,
            summary.sent_to_pool
        );
    }
    println!("module balance: {}", gateway.module_balance());

    if persist {
        keeper.save(&config.state_path)?;
        info!("Saved keeper state to {}", config.state_path.display());
    }

    Ok(())
}
