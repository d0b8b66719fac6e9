//! msm-watchdogd - MSM hardware watchdog daemon
//!
//! Arms the watchdog at startup, keeps it petted, and disables it again on
//! SIGTERM or SIGINT.

#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod cli;
mod config;
mod daemon;
mod signal;

use std::future::Future;

use anyhow::Result;
use clap::Parser;
use msm_watchdog::{RecordingMapper, SupervisorConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::daemon::RunSummary;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "starting msm-watchdogd");
    let config = config::resolve(&cli).await?;

    let shutdown = signal::ShutdownSignal::register()?.recv();

    let summary = if cli.dry_run {
        let mapper = RecordingMapper::new();
        let log = mapper.log();
        let summary = daemon::run(config, mapper, cli.continue_unprotected, shutdown).await?;
        info!(writes = log.write_count(), "dry run finished, no hardware touched");
        summary
    } else {
        run_on_hardware(&cli, config, shutdown).await?
    };

    info!(outcome = ?summary.outcome, "msm-watchdogd stopped");
    Ok(())
}

fn init_logging(cli: &Cli) {
    let level = cli.log_level();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("msm_watchdogd={level},msm_watchdog={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[cfg(unix)]
async fn run_on_hardware(
    cli: &Cli,
    config: SupervisorConfig,
    shutdown: impl Future<Output = Result<()>>,
) -> Result<RunSummary> {
    let mapper = msm_watchdog::DevMemMapper::with_path(&cli.dev_mem);
    info!(dev_mem = %mapper.path().display(), "mapping registers from memory device");
    daemon::run(config, mapper, cli.continue_unprotected, shutdown).await
}

#[cfg(not(unix))]
async fn run_on_hardware(
    _cli: &Cli,
    _config: SupervisorConfig,
    _shutdown: impl Future<Output = Result<()>>,
) -> Result<RunSummary> {
    anyhow::bail!("hardware access requires a unix memory device; use --dry-run")
}
