//! Supervisor lifecycle inside the daemon.

use std::future::Future;

use anyhow::{Context, Result};
use msm_watchdog::{HeartbeatMetrics, HeartbeatSupervisor, RegisterMapper, SupervisorConfig};
use tracing::{info, warn};

/// How the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The watchdog was armed and disabled again on shutdown.
    Stopped,
    /// The configuration opted out; nothing was armed.
    Disabled,
    /// Arming failed and the daemon was told to exit without an error.
    Unprotected,
}

/// What the daemon reports on exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Strobe timing over the whole run.
    pub metrics: HeartbeatMetrics,
}

/// Arm the watchdog, wait for `shutdown`, then disarm it.
///
/// # Errors
///
/// Fails if arming fails (unless `continue_unprotected`), or if waiting for
/// shutdown fails. In the latter case the watchdog is disarmed first.
pub async fn run<M, S>(
    config: SupervisorConfig,
    mapper: M,
    continue_unprotected: bool,
    shutdown: S,
) -> Result<RunSummary>
where
    M: RegisterMapper,
    S: Future<Output = Result<()>>,
{
    let mut supervisor = HeartbeatSupervisor::new(config, mapper)?;

    if let Err(err) = supervisor.start() {
        if continue_unprotected {
            warn!(error = %err, "continuing without hardware watchdog protection");
            return Ok(summary(&supervisor, RunOutcome::Unprotected));
        }
        return Err(err).context("Failed to arm the MSM watchdog");
    }
    if !supervisor.is_armed() {
        return Ok(summary(&supervisor, RunOutcome::Disabled));
    }

    let waited = shutdown.await;
    supervisor.stop().await;

    let report = summary(&supervisor, RunOutcome::Stopped);
    info!(
        ticks = report.metrics.tick_count,
        min_interval_us = report.metrics.min_tick_interval_us,
        max_interval_us = report.metrics.max_tick_interval_us,
        jitter_us = report.metrics.jitter_us(micros(config.pet_interval_ms)),
        "heartbeat summary"
    );
    waited.context("Shutdown signal handling failed")?;
    Ok(report)
}

fn summary<M: RegisterMapper>(
    supervisor: &HeartbeatSupervisor<M>,
    outcome: RunOutcome,
) -> RunSummary {
    RunSummary {
        outcome,
        metrics: supervisor.metrics(),
    }
}

fn micros(ms: u64) -> u64 {
    ms.saturating_mul(1_000)
}
