//! Shutdown signal handling.
//!
//! Handlers are registered before the watchdog is armed, so a registration
//! failure aborts startup instead of disarming a running heartbeat.

use anyhow::Result;
use tracing::info;

/// Registered SIGTERM and SIGINT handlers.
#[cfg(unix)]
#[derive(Debug)]
pub struct ShutdownSignal {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignal {
    /// Install the handlers. Must be called within a tokio runtime.
    pub fn register() -> Result<Self> {
        use anyhow::Context;
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            sigterm: signal(SignalKind::terminate())
                .context("Failed to register SIGTERM handler")?,
            sigint: signal(SignalKind::interrupt())
                .context("Failed to register SIGINT handler")?,
        })
    }

    /// Resolve once SIGTERM or SIGINT arrives.
    pub async fn recv(mut self) -> Result<()> {
        tokio::select! {
            _ = self.sigterm.recv() => info!("Received SIGTERM"),
            _ = self.sigint.recv() => info!("Received SIGINT"),
        }
        Ok(())
    }
}

/// Ctrl+C handling.
#[cfg(not(unix))]
#[derive(Debug)]
pub struct ShutdownSignal;

#[cfg(not(unix))]
impl ShutdownSignal {
    /// Nothing to install up front; Ctrl+C is hooked on first wait.
    pub fn register() -> Result<Self> {
        Ok(Self)
    }

    /// Resolve once Ctrl+C arrives.
    pub async fn recv(self) -> Result<()> {
        use anyhow::Context;

        tokio::signal::ctrl_c()
            .await
            .context("Failed to wait for Ctrl+C")?;
        info!("Received Ctrl+C");
        Ok(())
    }
}
