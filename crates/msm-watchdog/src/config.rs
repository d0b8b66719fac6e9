//! Configuration types for the heartbeat supervisor.
//!
//! Bark, bite, clock rate and pet interval are all configurable, so the pet
//! margin is re-derived by [`SupervisorConfig::validate`] instead of being
//! assumed from the defaults.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::diagnostics::DiagnosticMarker;
use crate::error::{StartupError, SupervisorResult};
use crate::registers::{
    DEFAULT_BARK_TICKS, DEFAULT_BITE_TICKS, DEFAULT_PET_INTERVAL_MS, DLOAD_MODE_ADDR,
    REGISTER_WIDTH, REGISTER_WINDOW_SIZE, Register, SLEEP_CLOCK_HZ, TCSR_BASE, TCSR_WDT_CFG,
    TIMER_BASE, ranges_overlap, ticks_to_duration,
};

/// The bark timeout must be at least this many pet intervals long.
pub const MIN_PET_MARGIN: u32 = 2;

/// Location of the TCSR block used to route the watchdog output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcsrConfig {
    /// Physical base of the TCSR block.
    pub base: u64,
    /// Mapped window size in bytes.
    pub window: usize,
}

impl Default for TcsrConfig {
    fn default() -> Self {
        Self {
            base: TCSR_BASE,
            window: REGISTER_WINDOW_SIZE,
        }
    }
}

/// Heartbeat supervisor configuration.
///
/// Read once when the supervisor is constructed. Every field has a default,
/// so a partial JSON document is enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Arm the watchdog at all. When false, `start` touches no hardware.
    ///
    /// Default: true.
    pub enabled: bool,

    /// Write the download-mode markers before arming.
    ///
    /// Default: false.
    pub debug_mode: bool,

    /// Physical base of the timer block.
    pub timer_base: u64,

    /// Size of the mapped timer window in bytes.
    pub timer_window: usize,

    /// Bark threshold in sleep-clock ticks.
    pub bark_ticks: u32,

    /// Bite threshold in sleep-clock ticks.
    pub bite_ticks: u32,

    /// Sleep clock rate in Hz.
    pub sleep_clock_hz: u32,

    /// Interval between reset strobes in milliseconds.
    pub pet_interval_ms: u64,

    /// TCSR routing block, or `None` when the platform needs no routing.
    pub tcsr: Option<TcsrConfig>,

    /// Physical address of the download-mode marker words.
    pub diagnostic_base: u64,
}

impl SupervisorConfig {
    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> SupervisorConfigBuilder {
        SupervisorConfigBuilder::default()
    }

    /// Validate timing and register layout.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> SupervisorResult<()> {
        if self.bark_ticks == 0 {
            return Err(StartupError::invalid_configuration(
                "bark_ticks must be greater than 0",
            ));
        }
        if self.bite_ticks < self.bark_ticks {
            return Err(StartupError::invalid_configuration(
                "bite_ticks must not be shorter than bark_ticks",
            ));
        }
        if self.sleep_clock_hz == 0 {
            return Err(StartupError::invalid_configuration(
                "sleep_clock_hz must be greater than 0",
            ));
        }
        if self.pet_interval_ms == 0 {
            return Err(StartupError::invalid_configuration(
                "pet_interval_ms must be greater than 0",
            ));
        }
        if self.pet_interval().saturating_mul(MIN_PET_MARGIN) > self.bark_timeout() {
            return Err(StartupError::invalid_configuration(format!(
                "pet interval {}ms leaves less than {MIN_PET_MARGIN}x margin to the {}ms bark timeout",
                self.pet_interval_ms,
                self.bark_timeout().as_millis()
            )));
        }
        if self.timer_window < Register::min_window() {
            return Err(StartupError::invalid_configuration(format!(
                "timer_window must be at least {:#x}",
                Register::min_window()
            )));
        }
        if window_wraps(self.timer_base, self.timer_window) {
            return Err(StartupError::invalid_configuration(
                "timer window wraps the address space",
            ));
        }
        if let Some(tcsr) = self.tcsr {
            if tcsr.window < TCSR_WDT_CFG + REGISTER_WIDTH {
                return Err(StartupError::invalid_configuration(format!(
                    "tcsr window must be at least {:#x}",
                    TCSR_WDT_CFG + REGISTER_WIDTH
                )));
            }
            if window_wraps(tcsr.base, tcsr.window) {
                return Err(StartupError::invalid_configuration(
                    "tcsr window wraps the address space",
                ));
            }
            if ranges_overlap(self.timer_base, self.timer_window, tcsr.base, tcsr.window) {
                return Err(StartupError::invalid_configuration(
                    "tcsr window overlaps the timer window",
                ));
            }
        }
        if self.debug_mode {
            let marker = self.diagnostic_marker();
            if ranges_overlap(
                self.timer_base,
                self.timer_window,
                marker.address,
                marker.window(),
            ) {
                return Err(StartupError::invalid_configuration(
                    "diagnostics region overlaps the timer window",
                ));
            }
        }
        Ok(())
    }

    /// Wall-clock length of the bark threshold.
    #[must_use]
    pub fn bark_timeout(&self) -> Duration {
        ticks_to_duration(self.bark_ticks, self.sleep_clock_hz)
    }

    /// Wall-clock length of the bite threshold.
    #[must_use]
    pub fn bite_timeout(&self) -> Duration {
        ticks_to_duration(self.bite_ticks, self.sleep_clock_hz)
    }

    /// Interval between reset strobes.
    #[must_use]
    pub fn pet_interval(&self) -> Duration {
        Duration::from_millis(self.pet_interval_ms)
    }

    /// How many whole pet intervals fit into the bark timeout.
    #[must_use]
    pub fn pet_margin(&self) -> u128 {
        let pet = self.pet_interval().as_micros();
        if pet == 0 {
            return 0;
        }
        self.bark_timeout().as_micros() / pet
    }

    /// Download-mode marker for this configuration.
    #[must_use]
    pub fn diagnostic_marker(&self) -> DiagnosticMarker {
        DiagnosticMarker::at(self.diagnostic_base)
    }
}

fn window_wraps(base: u64, window: usize) -> bool {
    u64::try_from(window)
        .ok()
        .and_then(|len| base.checked_add(len))
        .is_none()
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debug_mode: false,
            timer_base: TIMER_BASE,
            timer_window: REGISTER_WINDOW_SIZE,
            bark_ticks: DEFAULT_BARK_TICKS,
            bite_ticks: DEFAULT_BITE_TICKS,
            sleep_clock_hz: SLEEP_CLOCK_HZ,
            pet_interval_ms: DEFAULT_PET_INTERVAL_MS,
            tcsr: Some(TcsrConfig::default()),
            diagnostic_base: DLOAD_MODE_ADDR,
        }
    }
}

/// Builder for `SupervisorConfig`.
#[derive(Debug, Default)]
pub struct SupervisorConfigBuilder {
    config: SupervisorConfig,
}

impl SupervisorConfigBuilder {
    /// Enable or disable the watchdog.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Enable or disable the download-mode markers.
    #[must_use]
    pub fn debug_mode(mut self, debug_mode: bool) -> Self {
        self.config.debug_mode = debug_mode;
        self
    }

    /// Set the timer block base and window.
    #[must_use]
    pub fn timer(mut self, base: u64, window: usize) -> Self {
        self.config.timer_base = base;
        self.config.timer_window = window;
        self
    }

    /// Set the bark threshold in ticks.
    #[must_use]
    pub fn bark_ticks(mut self, ticks: u32) -> Self {
        self.config.bark_ticks = ticks;
        self
    }

    /// Set the bite threshold in ticks.
    #[must_use]
    pub fn bite_ticks(mut self, ticks: u32) -> Self {
        self.config.bite_ticks = ticks;
        self
    }

    /// Set the sleep clock rate in Hz.
    #[must_use]
    pub fn sleep_clock_hz(mut self, hz: u32) -> Self {
        self.config.sleep_clock_hz = hz;
        self
    }

    /// Set the pet interval in milliseconds.
    #[must_use]
    pub fn pet_interval_ms(mut self, ms: u64) -> Self {
        self.config.pet_interval_ms = ms;
        self
    }

    /// Set or clear the TCSR routing block.
    #[must_use]
    pub fn tcsr(mut self, tcsr: Option<TcsrConfig>) -> Self {
        self.config.tcsr = tcsr;
        self
    }

    /// Set the download-mode marker address.
    #[must_use]
    pub fn diagnostic_base(mut self, address: u64) -> Self {
        self.config.diagnostic_base = address;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> SupervisorResult<SupervisorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SupervisorConfig::default();
        assert!(config.enabled);
        assert!(!config.debug_mode);
        assert_eq!(config.bark_ticks, 22_000);
        assert_eq!(config.bite_ticks, 22_000);
        assert_eq!(config.pet_interval_ms, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_margin() {
        let config = SupervisorConfig::default();
        assert_eq!(config.bark_timeout().as_millis(), 671);
        assert!(config.pet_interval() < config.bark_timeout());
        assert_eq!(config.pet_margin(), 2);
    }

    #[test]
    fn test_pet_interval_too_close_to_bark() {
        let result = SupervisorConfig::builder().pet_interval_ms(400).build();
        assert!(matches!(result, Err(StartupError::InvalidConfiguration(_))));

        let result = SupervisorConfig::builder()
            .bark_ticks(16_384)
            .bite_ticks(16_384)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_bite_shorter_than_bark_rejected() {
        let result = SupervisorConfig::builder()
            .bark_ticks(30_000)
            .bite_ticks(22_000)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_short_timer_window_rejected() {
        let result = SupervisorConfig::builder().timer(TIMER_BASE, 0x40).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_diagnostics_overlap_rejected_only_in_debug_mode() {
        let overlapping = TIMER_BASE + 0x100;
        assert!(
            SupervisorConfig::builder()
                .diagnostic_base(overlapping)
                .build()
                .is_ok()
        );
        assert!(
            SupervisorConfig::builder()
                .debug_mode(true)
                .diagnostic_base(overlapping)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_config_builder() -> SupervisorResult<()> {
        let config = SupervisorConfig::builder()
            .enabled(false)
            .debug_mode(true)
            .pet_interval_ms(100)
            .tcsr(None)
            .build()?;
        assert!(!config.enabled);
        assert!(config.debug_mode);
        assert_eq!(config.pet_interval(), Duration::from_millis(100));
        assert!(config.tcsr.is_none());
        Ok(())
    }

    #[test]
    fn test_partial_json_uses_defaults() -> Result<(), serde_json::Error> {
        let config: SupervisorConfig = serde_json::from_str(r#"{ "enabled": false }"#)?;
        assert!(!config.enabled);
        assert_eq!(config.timer_base, TIMER_BASE);
        assert_eq!(config.tcsr, Some(TcsrConfig::default()));
        Ok(())
    }
}
