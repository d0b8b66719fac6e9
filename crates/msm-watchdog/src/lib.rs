//! # msm-watchdog
//!
//! Heartbeat supervisor for the hardware watchdog in the MSM timer block.
//!
//! Once armed, the watchdog barks (interrupt) and then bites (reset) unless
//! the reset strobe register is written before the countdown expires. This
//! crate maps the timer registers, programs the bark and bite thresholds,
//! enables the counter and strobes it from a tokio task every pet interval.
//!
//! - [`HeartbeatSupervisor`] owns the lifecycle: `start`, heartbeat, `stop`.
//! - [`RegisterMapper`] / [`RegisterBlock`] abstract the register bus.
//!   [`DevMemMapper`] maps `/dev/mem`; [`RecordingMapper`] records every
//!   access for tests and dry runs.
//! - [`SupervisorConfig`] carries addresses and timings and checks that the
//!   pet interval leaves at least a 2x margin to the bark timeout.
//!
//! ## Timing
//!
//! With the default 32768 Hz sleep clock, 22000 ticks is about 671 ms. A
//! 300 ms heartbeat therefore strobes twice per bark period.
//!
//! ## State Machine
//!
//! ```text
//! Disabled ──start()──► Armed ──stop()──► Disabled
//! ```
//!
//! ## Example
//!
//! ```rust
//! use msm_watchdog::prelude::*;
//! use msm_watchdog::registers::TIMER_BASE;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() -> Result<(), StartupError> {
//! let mapper = RecordingMapper::new();
//! let log = mapper.log();
//!
//! let mut supervisor = HeartbeatSupervisor::new(SupervisorConfig::default(), mapper)?;
//! supervisor.start()?;
//!
//! tokio::time::sleep(std::time::Duration::from_millis(650)).await;
//! assert_eq!(log.count(TIMER_BASE, Register::ResetStrobe), 2);
//!
//! supervisor.stop().await;
//! assert!(!supervisor.is_armed());
//! # Ok(())
//! # }
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod device;
pub mod diagnostics;
pub mod error;
#[cfg(unix)]
pub mod mmio;
pub mod prelude;
pub mod recording;
pub mod registers;
pub mod schedule;
pub mod state;
pub mod supervisor;

pub use config::{SupervisorConfig, SupervisorConfigBuilder, TcsrConfig};
pub use device::{RegisterBlock, RegisterMapper, Reservations, UnmapError, WatchdogDevice};
pub use diagnostics::DiagnosticMarker;
pub use error::{DiagnosticWriteError, MapError, StartupError, SupervisorResult};
#[cfg(unix)]
pub use mmio::{DevMemMapper, MmioBlock};
pub use recording::{BusEvent, BusLog, RecordingBlock, RecordingMapper, RegisterWrite};
pub use registers::{Region, Register};
pub use schedule::HeartbeatSchedule;
pub use state::{HeartbeatMetrics, SupervisorState, SupervisorStatus};
pub use supervisor::{HeartbeatSupervisor, StopOutcome};
