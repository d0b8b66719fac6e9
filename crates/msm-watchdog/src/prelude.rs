//! Prelude for msm-watchdog.
//!
//! Re-exports the types needed to run a supervisor.
//!
//! # Example
//!
//! ```rust
//! use msm_watchdog::prelude::*;
//!
//! let config = SupervisorConfig::builder().enabled(false).build()?;
//! let supervisor = HeartbeatSupervisor::new(config, RecordingMapper::new())?;
//! assert_eq!(supervisor.status(), SupervisorStatus::Disabled);
//! # Ok::<(), StartupError>(())
//! ```

pub use crate::config::{SupervisorConfig, SupervisorConfigBuilder, TcsrConfig};
pub use crate::device::{RegisterBlock, RegisterMapper, WatchdogDevice};
pub use crate::error::{StartupError, SupervisorResult};
#[cfg(unix)]
pub use crate::mmio::DevMemMapper;
pub use crate::recording::{BusLog, RecordingMapper};
pub use crate::registers::Register;
pub use crate::state::{HeartbeatMetrics, SupervisorStatus};
pub use crate::supervisor::{HeartbeatSupervisor, StopOutcome};
