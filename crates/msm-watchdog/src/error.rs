//! Error types for watchdog mapping and supervisor lifecycle.

use thiserror::Error;

use crate::registers::Region;

/// Errors raised while mapping a register window.
#[derive(Debug, Error)]
pub enum MapError {
    /// The requested range is empty or wraps the physical address space.
    #[error("invalid register range {base:#x}+{size:#x}")]
    InvalidRange {
        /// Physical base address.
        base: u64,
        /// Window size in bytes.
        size: usize,
    },

    /// The range overlaps a window that is still mapped.
    #[error("register range {base:#x}+{size:#x} is already mapped")]
    AlreadyMapped {
        /// Physical base address.
        base: u64,
        /// Window size in bytes.
        size: usize,
    },

    /// The operating system refused the mapping.
    #[error("failed to map {base:#x}+{size:#x}: {source}")]
    Os {
        /// Physical base address.
        base: u64,
        /// Window size in bytes.
        size: usize,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

impl MapError {
    /// Create an OS mapping error.
    #[must_use]
    pub fn os(base: u64, size: usize, source: std::io::Error) -> Self {
        Self::Os { base, size, source }
    }
}

/// Failure to write the download-mode markers.
///
/// Never propagated out of `start`; the supervisor logs it and keeps arming.
#[derive(Debug, Error)]
pub enum DiagnosticWriteError {
    /// The diagnostics region could not be mapped.
    #[error("diagnostics region unavailable: {0}")]
    Map(#[from] MapError),
}

/// Errors returned by `HeartbeatSupervisor` construction and `start`.
#[derive(Debug, Error)]
pub enum StartupError {
    /// A register window required for arming could not be mapped.
    #[error("{region} registers unavailable: {source}")]
    DeviceUnavailable {
        /// Which region failed.
        region: Region,
        /// Mapping failure.
        #[source]
        source: MapError,
    },

    /// The configuration violates a timing or layout constraint.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// `start` was called while the watchdog is already armed.
    #[error("Watchdog supervisor is already started")]
    AlreadyStarted,

    /// No tokio runtime is available to run the heartbeat.
    #[error("No async runtime available to schedule the heartbeat")]
    SchedulerUnavailable,
}

impl StartupError {
    /// Create a device unavailable error.
    #[must_use]
    pub fn device_unavailable(region: Region, source: MapError) -> Self {
        Self::DeviceUnavailable { region, source }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

/// A specialized `Result` type for supervisor lifecycle operations.
pub type SupervisorResult<T> = std::result::Result<T, StartupError>;
