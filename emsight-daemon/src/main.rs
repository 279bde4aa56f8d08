use anyhow::Result;
use clap::Parser;

use emsight_daemon::cli::DaemonCli;
use emsight_daemon::logging::init_tracing;
use emsight_daemon::orchestrator::{Orchestrator, resolve_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    let config = resolve_config(&cli).await?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    init_tracing(&config.general)?;
    if !cli.config.exists() {
        tracing::warn!(
            path = %cli.config.display(),
            "config file not found, using built-in defaults"
        );
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "emsight-daemon starting");

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    let stats = orchestrator.run().await?;

    tracing::info!(
        lines = stats.lines_received,
        dropped = stats.lines_dropped,
        events = stats.events_normalized,
        incidents = stats.incidents,
        anomalies = stats.anomalies,
        "emsight-daemon shut down"
    );
    Ok(())
}
