//! Heartbeat supervisor: arms the watchdog and keeps petting it.
//!
//! The supervisor owns the mapped timer block, the optional TCSR routing
//! block and the heartbeat task. `start` programs bark, bite and enable (in
//! that order) and schedules the first strobe one pet interval later; `stop`
//! cancels the pending strobe, clears enable and releases the mappings.
//!
//! # Failure Semantics
//!
//! - A timer or TCSR mapping failure aborts `start` before any watchdog
//!   register is written.
//! - A failed download-mode marker write is logged and ignored.
//! - The tick has no error path. If the heartbeat starves, the hardware bite
//!   resets the system; that is the intended last line of defence.
//!
//! `start` and `stop` take `&mut self`, so callers sharing a supervisor
//! across threads must serialize them (e.g. behind a mutex).

use std::mem::ManuallyDrop;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::{SupervisorConfig, TcsrConfig};
use crate::device::{RegisterBlock, RegisterMapper, WatchdogDevice};
use crate::error::{StartupError, SupervisorResult};
use crate::registers::{Region, TCSR_WDT_CFG, TCSR_WDT_CFG_VALUE};
use crate::schedule::HeartbeatSchedule;
use crate::state::{HeartbeatMetrics, SupervisorState, SupervisorStatus};

/// What `stop` found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The watchdog was armed and has been disabled.
    Disabled,
    /// Nothing was armed; no hardware was touched.
    NotRunning,
}

#[derive(Debug)]
struct ArmedHardware<B: RegisterBlock> {
    device: Arc<Mutex<WatchdogDevice<B>>>,
    tcsr: Option<B>,
    schedule: HeartbeatSchedule,
}

/// Owns the watchdog hardware and its heartbeat for one process.
///
/// # Example
///
/// ```rust
/// use msm_watchdog::prelude::*;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), StartupError> {
/// let mapper = RecordingMapper::new();
/// let log = mapper.log();
/// let mut supervisor = HeartbeatSupervisor::new(SupervisorConfig::default(), mapper)?;
///
/// supervisor.start()?;
/// assert!(supervisor.is_armed());
///
/// assert_eq!(supervisor.stop().await, StopOutcome::Disabled);
/// assert_eq!(log.count(msm_watchdog::registers::TIMER_BASE, Register::Enable), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct HeartbeatSupervisor<M: RegisterMapper> {
    config: SupervisorConfig,
    mapper: M,
    state: Arc<SupervisorState>,
    metrics: Arc<Mutex<HeartbeatMetrics>>,
    epoch: Instant,
    armed: Option<ArmedHardware<M::Block>>,
}

impl<M: RegisterMapper> HeartbeatSupervisor<M> {
    /// Create a supervisor. No hardware is touched until `start`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: SupervisorConfig, mapper: M) -> SupervisorResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            mapper,
            state: Arc::new(SupervisorState::new()),
            metrics: Arc::new(Mutex::new(HeartbeatMetrics::new())),
            epoch: Instant::now(),
            armed: None,
        })
    }

    /// Arm the watchdog and start the heartbeat.
    ///
    /// With `enabled == false` this returns `Ok` without touching hardware.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`StartupError::AlreadyStarted`] if already armed.
    /// - [`StartupError::DeviceUnavailable`] if the timer or TCSR block
    ///   cannot be mapped; no watchdog register has been written.
    /// - [`StartupError::SchedulerUnavailable`] outside a tokio runtime; the
    ///   watchdog is disabled again before returning.
    pub fn start(&mut self) -> SupervisorResult<()> {
        if self.armed.is_some() || self.state.is_armed() {
            return Err(StartupError::AlreadyStarted);
        }
        if !self.config.enabled {
            info!("MSM watchdog not initialized (disabled by configuration)");
            return Ok(());
        }
        info!("MSM watchdog initializing");

        if self.config.debug_mode
            && let Err(err) = self.config.diagnostic_marker().write(&self.mapper)
        {
            warn!(
                region = %Region::Diagnostics,
                error = %err,
                "download-mode diagnostics not written"
            );
        }

        let mut device = WatchdogDevice::map(
            &self.mapper,
            self.config.timer_base,
            self.config.timer_window,
        )
        .map_err(|source| StartupError::device_unavailable(Region::Timer, source))?;

        let tcsr = self
            .config
            .tcsr
            .map(|tcsr| self.route_through_tcsr(tcsr))
            .transpose()?;

        device.set_bark_ticks(self.config.bark_ticks);
        device.set_bite_ticks(self.config.bite_ticks);
        device.enable();

        let device = Arc::new(Mutex::new(device));
        self.metrics.lock().reset();
        let schedule = match HeartbeatSchedule::spawn(
            self.config.pet_interval(),
            Self::heartbeat(
                Arc::clone(&device),
                Arc::clone(&self.state),
                Arc::clone(&self.metrics),
                self.epoch,
            ),
        ) {
            Ok(schedule) => schedule,
            Err(err) => {
                device.lock().disable();
                return Err(err);
            }
        };

        self.state.arm()?;
        self.armed = Some(ArmedHardware {
            device,
            tcsr,
            schedule,
        });

        info!(
            pet_interval_ms = self.config.pet_interval_ms,
            bark_timeout_ms = self.config.bark_timeout().as_millis(),
            bite_timeout_ms = self.config.bite_timeout().as_millis(),
            "MSM watchdog initialized"
        );
        Ok(())
    }

    /// Disable the watchdog and cancel the heartbeat.
    ///
    /// No strobe is written after this returns. Safe to call when `start`
    /// was a no-op or has not been called.
    pub async fn stop(&mut self) -> StopOutcome {
        let Some(mut armed) = self.armed.take() else {
            debug!("MSM watchdog stop requested while not armed");
            return StopOutcome::NotRunning;
        };

        armed.schedule.cancel().await;
        armed.device.lock().disable();
        self.state.disarm();

        match Arc::try_unwrap(armed.device) {
            Ok(device) => {
                if device.into_inner().unmap().is_err() {
                    warn!("watchdog registers still enabled at unmap");
                }
            }
            Err(_shared) => warn!("heartbeat still holds the watchdog registers"),
        }
        drop(armed.tcsr);

        info!("MSM watchdog exit - deactivated");
        StopOutcome::Disabled
    }

    fn route_through_tcsr(&self, tcsr: TcsrConfig) -> SupervisorResult<M::Block> {
        let mut block = self
            .mapper
            .map(tcsr.base, tcsr.window)
            .map_err(|source| StartupError::device_unavailable(Region::Tcsr, source))?;
        block.write(TCSR_WDT_CFG, TCSR_WDT_CFG_VALUE);
        debug!(base = format_args!("{:#x}", tcsr.base), "watchdog routed through TCSR");
        Ok(block)
    }

    fn heartbeat(
        device: Arc<Mutex<WatchdogDevice<M::Block>>>,
        state: Arc<SupervisorState>,
        metrics: Arc<Mutex<HeartbeatMetrics>>,
        epoch: Instant,
    ) -> impl FnMut() + Send + 'static {
        move || {
            device.lock().strobe();
            state.record_tick();
            let now_us = u64::try_from(epoch.elapsed().as_micros()).unwrap_or(u64::MAX);
            metrics.lock().record_tick(now_us);
            trace!(tick = state.tick_count(), "watchdog petted");
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> SupervisorStatus {
        self.state.status()
    }

    /// Whether the watchdog is armed and being petted.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.state.is_armed()
    }

    /// Whether a next strobe is pending.
    #[must_use]
    pub fn is_heartbeat_scheduled(&self) -> bool {
        self.armed
            .as_ref()
            .is_some_and(|armed| armed.schedule.is_scheduled())
    }

    /// Total strobes written since construction.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.state.tick_count()
    }

    /// Shared status and counters.
    #[must_use]
    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    /// Snapshot of the strobe timing metrics since the last `start`.
    #[must_use]
    pub fn metrics(&self) -> HeartbeatMetrics {
        *self.metrics.lock()
    }

    /// The configuration read at construction.
    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// The register mapper.
    #[must_use]
    pub fn mapper(&self) -> &M {
        &self.mapper
    }
}

/// Dropping an armed supervisor aborts the heartbeat but leaves the watchdog
/// enabled, so the hardware bites. The timer mapping is leaked rather than
/// released, since the registers must stay mapped while enable is set.
impl<M: RegisterMapper> Drop for HeartbeatSupervisor<M> {
    fn drop(&mut self) {
        let Some(armed) = self.armed.take() else {
            return;
        };
        warn!("supervisor dropped while armed; heartbeat cancelled, the watchdog will bite");
        drop(armed.schedule);
        drop(armed.tcsr);
        let _still_enabled = ManuallyDrop::new(armed.device);
    }
}
