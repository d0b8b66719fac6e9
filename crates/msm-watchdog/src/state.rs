//! Supervisor state machine and heartbeat metrics.
//!
//! The status is `Disabled` before `start`, after `stop`, and for the whole
//! life of a supervisor whose configuration opts out. Ticking is not a state
//! of its own: it is what an `Armed` supervisor does.
//!
//! ```text
//! Disabled ──start()──► Armed ──stop()──► Disabled
//!                        │  ▲
//!                        └──┘
//!                        tick
//! ```

use portable_atomic::{AtomicU32, AtomicU64, Ordering};

use crate::error::{StartupError, SupervisorResult};

/// Supervisor operational status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum SupervisorStatus {
    /// Watchdog hardware is not enabled by this supervisor.
    #[default]
    Disabled = 0,
    /// Watchdog is programmed, enabled and being petted.
    Armed = 1,
}

impl SupervisorStatus {
    /// Convert from raw u32 value.
    #[must_use]
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Disabled),
            1 => Some(Self::Armed),
            _ => None,
        }
    }

    /// Convert to raw u32 value.
    #[must_use]
    pub fn to_raw(self) -> u32 {
        self as u32
    }

    /// Get the status as a string slice.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "Disabled",
            Self::Armed => "Armed",
        }
    }
}

impl core::fmt::Display for SupervisorStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lock-free supervisor status shared with the heartbeat task.
#[derive(Debug)]
pub struct SupervisorState {
    status: AtomicU32,
    start_count: AtomicU32,
    stop_count: AtomicU32,
    tick_count: AtomicU64,
}

impl SupervisorState {
    /// Create a new state in the `Disabled` status.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: AtomicU32::new(SupervisorStatus::Disabled.to_raw()),
            start_count: AtomicU32::new(0),
            stop_count: AtomicU32::new(0),
            tick_count: AtomicU64::new(0),
        }
    }

    /// Get the current status.
    #[must_use]
    pub fn status(&self) -> SupervisorStatus {
        let raw = self.status.load(Ordering::Acquire);
        SupervisorStatus::from_raw(raw).unwrap_or_default()
    }

    /// Transition from `Disabled` to `Armed`.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::AlreadyStarted`] if already armed.
    pub fn arm(&self) -> SupervisorResult<()> {
        self.status
            .compare_exchange(
                SupervisorStatus::Disabled.to_raw(),
                SupervisorStatus::Armed.to_raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_current| StartupError::AlreadyStarted)?;
        self.start_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Transition from `Armed` to `Disabled`.
    ///
    /// Returns false if the supervisor was not armed.
    pub fn disarm(&self) -> bool {
        let disarmed = self
            .status
            .compare_exchange(
                SupervisorStatus::Armed.to_raw(),
                SupervisorStatus::Disabled.to_raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if disarmed {
            self.stop_count.fetch_add(1, Ordering::Relaxed);
        }
        disarmed
    }

    /// Count one reset strobe.
    pub fn record_tick(&self) {
        self.tick_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether the supervisor is armed.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.status() == SupervisorStatus::Armed
    }

    /// Number of successful starts.
    #[must_use]
    pub fn start_count(&self) -> u32 {
        self.start_count.load(Ordering::Acquire)
    }

    /// Number of stops that disabled an armed watchdog.
    #[must_use]
    pub fn stop_count(&self) -> u32 {
        self.stop_count.load(Ordering::Acquire)
    }

    /// Total reset strobes issued by the heartbeat.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Acquire)
    }
}

impl Default for SupervisorState {
    fn default() -> Self {
        Self::new()
    }
}

/// Timing of the reset strobes.
///
/// Timestamps are microseconds since the supervisor was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartbeatMetrics {
    /// Total number of strobes.
    pub tick_count: u64,
    /// Timestamp of the most recent strobe.
    pub last_tick_us: Option<u64>,
    /// Shortest gap seen between two strobes.
    pub min_tick_interval_us: Option<u64>,
    /// Longest gap seen between two strobes.
    pub max_tick_interval_us: u64,
}

impl HeartbeatMetrics {
    /// Create a new metrics instance with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one strobe at `timestamp_us`.
    pub fn record_tick(&mut self, timestamp_us: u64) {
        if let Some(last) = self.last_tick_us {
            let interval = timestamp_us.saturating_sub(last);
            self.max_tick_interval_us = self.max_tick_interval_us.max(interval);
            self.min_tick_interval_us = Some(
                self.min_tick_interval_us
                    .map_or(interval, |min| min.min(interval)),
            );
        }
        self.last_tick_us = Some(timestamp_us);
        self.tick_count = self.tick_count.saturating_add(1);
    }

    /// Largest deviation of any strobe gap from `interval_us`.
    ///
    /// Returns `None` until at least two strobes were recorded.
    #[must_use]
    pub fn jitter_us(&self, interval_us: u64) -> Option<u64> {
        let min = self.min_tick_interval_us?;
        let early = interval_us.saturating_sub(min);
        let late = self.max_tick_interval_us.saturating_sub(interval_us);
        Some(early.max(late))
    }

    /// Reset all metrics.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
