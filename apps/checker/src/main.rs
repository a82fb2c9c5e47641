#![warn(clippy::all, clippy::pedantic)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use broker::Transport;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod checker;
mod config;
mod scheduler;
mod types;

use checker::checker_for;
use config::CheckerConfig;
use scheduler::{Monitor, MonitoringScheduler};
use types::CheckResult;

/// Probes HTTP and TCP endpoints on a schedule and reports them to Flapjack
#[derive(Debug, Parser)]
#[command(name = "http-checker", version, about)]
struct Cli {
    /// Monitor definitions
    #[arg(short, long, default_value = "checker.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init_with_debug(cli.debug);

    let config = CheckerConfig::load(&cli.config)?;
    let transport = Transport::connect(&config.redis, &config.queue)
        .await
        .with_context(|| format!("couldn't connect to Redis at {}", config.redis.address))?;

    let monitors = build_monitors(&config)?;
    info!(monitors = monitors.len(), "Starting checks");

    let (result_tx, result_rx) = mpsc::channel(256);
    let shutdown = CancellationToken::new();
    let scheduler = MonitoringScheduler::new(result_tx, shutdown.clone());
    let handles = scheduler.schedule_monitors(monitors);
    drop(scheduler);

    let notifier = tokio::spawn(notify(transport, result_rx));

    tokio::signal::ctrl_c().await?;
    info!("Interrupted, stopping checks");
    shutdown.cancel();

    for handle in handles {
        handle.await?;
    }
    notifier.await?;
    Ok(())
}

fn build_monitors(config: &CheckerConfig) -> Result<Vec<Monitor>> {
    let mut monitors = Vec::new();

    for monitor in config.monitors.iter().filter(|monitor| monitor.enabled) {
        let checker = checker_for(monitor.check_type, monitor.timeout()?)?;
        monitors.push(Monitor {
            name: monitor.name.clone(),
            check_type: monitor.check_type,
            target: monitor.url.clone(),
            interval: monitor.interval()?,
            checker: Arc::from(checker),
        });
    }

    Ok(monitors)
}

/// Push every probe result until all schedulers have stopped
async fn notify(transport: Transport, mut results: mpsc::Receiver<CheckResult>) {
    while let Some(result) = results.recv().await {
        let event = match result.to_event() {
            Ok(event) => event,
            Err(err) => {
                warn!(monitor = %result.monitor, "Skipping result: {err:#}");
                continue;
            }
        };

        match transport.send(&event).await {
            Ok(_) => info!(key = %event.key(), state = %event.state, "{}", event.summary),
            Err(err) => warn!(key = %event.key(), "Failed to send event: {err}"),
        }
    }
}
