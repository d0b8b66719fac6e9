//! Register layout of the MSM timer-block watchdog (WDT0).
//!
//! Offsets are relative to the timer block base and fixed by the silicon.
//! The TCSR and download-mode constants describe the two auxiliary regions
//! touched during startup.

use core::time::Duration;

/// Default physical base of the timer block.
pub const TIMER_BASE: u64 = 0xC010_0000;

/// Size of every register window mapped by the supervisor.
pub const REGISTER_WINDOW_SIZE: usize = 0x1000;

/// Value written to the reset strobe to restart the countdown.
pub const RESET_STROBE_VALUE: u32 = 1;

/// Enable value with both bark and bite active.
pub const ENABLE_BARK_AND_BITE: u32 = 3;

/// Enable value that stops the watchdog.
pub const ENABLE_OFF: u32 = 0;

/// Bark threshold in sleep-clock ticks (about 671 ms).
pub const DEFAULT_BARK_TICKS: u32 = 22_000;

/// Bite threshold in sleep-clock ticks.
pub const DEFAULT_BITE_TICKS: u32 = 22_000;

/// Rate of the sleep clock that drives the watchdog counter.
pub const SLEEP_CLOCK_HZ: u32 = 32_768;

/// Default interval between two reset strobes.
pub const DEFAULT_PET_INTERVAL_MS: u64 = 300;

/// Physical base of the TCSR block.
pub const TCSR_BASE: u64 = 0x16B0_0000;

/// Offset of the watchdog routing word inside the TCSR block.
pub const TCSR_WDT_CFG: usize = 0x30;

/// Routing value written to `TCSR_WDT_CFG` before the watchdog is armed.
pub const TCSR_WDT_CFG_VALUE: u32 = 3;

/// Physical address of the download-mode control word pair.
pub const DLOAD_MODE_ADDR: u64 = 0x2A03_E008;

/// First download-mode magic word.
pub const DLOAD_MAGIC_WRITE1: u32 = 0xE47B_337D;

/// Second download-mode magic word.
pub const DLOAD_MAGIC_WRITE2: u32 = 0xCE14_091A;

/// Width of one register access in bytes.
pub const REGISTER_WIDTH: usize = 4;

/// Watchdog registers inside the timer block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Register {
    /// Reset strobe (`WDT0_RST`).
    ResetStrobe = 0x38,
    /// Enable (`WDT0_EN`).
    Enable = 0x40,
    /// Bark threshold (`WDT0_BARK_TIME`).
    BarkTime = 0x4C,
    /// Bite threshold (`WDT0_BITE_TIME`).
    BiteTime = 0x5C,
}

impl Register {
    /// All registers, in address order.
    pub const ALL: [Self; 4] = [
        Self::ResetStrobe,
        Self::Enable,
        Self::BarkTime,
        Self::BiteTime,
    ];

    /// Byte offset from the timer block base.
    #[must_use]
    pub const fn offset(self) -> usize {
        self as usize
    }

    /// Look a register up by its offset.
    #[must_use]
    pub fn from_offset(offset: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.offset() == offset)
    }

    /// Get the register name as a string slice.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResetStrobe => "WDT0_RST",
            Self::Enable => "WDT0_EN",
            Self::BarkTime => "WDT0_BARK_TIME",
            Self::BiteTime => "WDT0_BITE_TIME",
        }
    }

    /// Smallest window that covers every watchdog register.
    #[must_use]
    pub const fn min_window() -> usize {
        Self::BiteTime.offset() + REGISTER_WIDTH
    }
}

impl core::fmt::Display for Register {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Memory regions the supervisor maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// Timer block holding the watchdog registers.
    Timer,
    /// TCSR block holding the watchdog routing word.
    Tcsr,
    /// Download-mode diagnostics control words.
    Diagnostics,
}

impl Region {
    /// Get the region name as a string slice.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timer => "timer",
            Self::Tcsr => "tcsr",
            Self::Diagnostics => "diagnostics",
        }
    }
}

impl core::fmt::Display for Region {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert a sleep-clock tick count into wall time.
///
/// Returns `Duration::ZERO` for a zero clock rate.
#[must_use]
pub fn ticks_to_duration(ticks: u32, clock_hz: u32) -> Duration {
    if clock_hz == 0 {
        return Duration::ZERO;
    }
    let nanos = u64::from(ticks).saturating_mul(1_000_000_000) / u64::from(clock_hz);
    Duration::from_nanos(nanos)
}

/// Whether two `[base, base + len)` ranges share at least one byte.
#[must_use]
pub fn ranges_overlap(a_base: u64, a_len: usize, b_base: u64, b_len: usize) -> bool {
    let a_end = a_base.saturating_add(a_len as u64);
    let b_end = b_base.saturating_add(b_len as u64);
    a_base < b_end && b_base < a_end
}
