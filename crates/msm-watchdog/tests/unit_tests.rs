//! Unit tests for the MSM watchdog building blocks.

#![cfg(test)]

use msm_watchdog::prelude::*;
use msm_watchdog::registers::{
    self, DLOAD_MODE_ADDR, REGISTER_WINDOW_SIZE, SLEEP_CLOCK_HZ, TCSR_BASE, TIMER_BASE,
};
use msm_watchdog::{MapError, Region, SupervisorState};
use std::time::Duration;

type TestResult = Result<(), Box<dyn std::error::Error>>;

mod register_layout {
    use super::*;

    #[test]
    fn test_register_names() {
        assert_eq!(Register::ResetStrobe.as_str(), "WDT0_RST");
        assert_eq!(Register::Enable.as_str(), "WDT0_EN");
        assert_eq!(Register::BarkTime.as_str(), "WDT0_BARK_TIME");
        assert_eq!(Register::BiteTime.as_str(), "WDT0_BITE_TIME");
    }

    #[test]
    fn test_from_offset_only_knows_watchdog_registers() {
        for register in Register::ALL {
            assert_eq!(Register::from_offset(register.offset()), Some(register));
        }
        assert_eq!(Register::from_offset(0x30), None);
        assert_eq!(Register::from_offset(0x3C), None);
    }

    #[test]
    fn test_fixed_addresses() {
        assert_eq!(TIMER_BASE, 0xC010_0000);
        assert_eq!(TCSR_BASE, 0x16B0_0000);
        assert_eq!(DLOAD_MODE_ADDR, 0x2A03_E008);
        assert_eq!(REGISTER_WINDOW_SIZE, 0x1000);
    }

    #[test]
    fn test_ticks_to_duration() {
        assert_eq!(
            registers::ticks_to_duration(SLEEP_CLOCK_HZ, SLEEP_CLOCK_HZ),
            Duration::from_secs(1)
        );
        assert_eq!(
            registers::ticks_to_duration(22_000, SLEEP_CLOCK_HZ).as_millis(),
            671
        );
        assert_eq!(registers::ticks_to_duration(22_000, 0), Duration::ZERO);
    }

    #[test]
    fn test_ranges_overlap() {
        assert!(registers::ranges_overlap(0x1000, 0x1000, 0x1FFC, 4));
        assert!(!registers::ranges_overlap(0x1000, 0x1000, 0x2000, 4));
        assert!(!registers::ranges_overlap(0x2000, 4, 0x1000, 0x1000));
    }
}

mod config {
    use super::*;

    #[test]
    fn test_defaults_leave_double_margin() -> TestResult {
        let config = SupervisorConfig::builder().build()?;
        assert!(config.pet_interval() * 2 <= config.bark_timeout());
        assert_eq!(config.pet_margin(), 2);
        assert_eq!(config.bite_timeout(), config.bark_timeout());
        Ok(())
    }

    #[test]
    fn test_longer_bark_allows_longer_pet() -> TestResult {
        let config = SupervisorConfig::builder()
            .bark_ticks(SLEEP_CLOCK_HZ * 4)
            .bite_ticks(SLEEP_CLOCK_HZ * 5)
            .pet_interval_ms(1_000)
            .build()?;
        assert_eq!(config.pet_margin(), 4);
        Ok(())
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(SupervisorConfig::builder().bark_ticks(0).build().is_err());
        assert!(SupervisorConfig::builder().pet_interval_ms(0).build().is_err());
        assert!(SupervisorConfig::builder().sleep_clock_hz(0).build().is_err());
    }

    #[test]
    fn test_tcsr_overlapping_timer_rejected() {
        let result = SupervisorConfig::builder()
            .tcsr(Some(TcsrConfig {
                base: TIMER_BASE,
                window: REGISTER_WINDOW_SIZE,
            }))
            .build();
        assert!(matches!(result, Err(StartupError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_tcsr_window_must_cover_routing_word() {
        let result = SupervisorConfig::builder()
            .tcsr(Some(TcsrConfig {
                base: TCSR_BASE,
                window: 0x30,
            }))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_wrapping_timer_window_rejected() {
        let result = SupervisorConfig::builder()
            .timer(u64::MAX - 0x10, REGISTER_WINDOW_SIZE)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_supervisor_new_validates() {
        let config = SupervisorConfig {
            pet_interval_ms: 500,
            ..SupervisorConfig::default()
        };
        let result = HeartbeatSupervisor::new(config, RecordingMapper::new());
        assert!(matches!(result, Err(StartupError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_config_json_round_trip() -> TestResult {
        let config = SupervisorConfig::builder()
            .debug_mode(true)
            .tcsr(None)
            .build()?;
        let json = serde_json::to_string(&config)?;
        let parsed: SupervisorConfig = serde_json::from_str(&json)?;
        assert_eq!(parsed, config);
        Ok(())
    }
}

mod state {
    use super::*;

    #[test]
    fn test_new_supervisor_is_disabled() -> TestResult {
        let supervisor =
            HeartbeatSupervisor::new(SupervisorConfig::default(), RecordingMapper::new())?;
        assert_eq!(supervisor.status(), SupervisorStatus::Disabled);
        assert!(!supervisor.is_armed());
        assert!(!supervisor.is_heartbeat_scheduled());
        assert_eq!(supervisor.tick_count(), 0);
        assert_eq!(supervisor.metrics(), HeartbeatMetrics::default());
        Ok(())
    }

    #[test]
    fn test_state_counters() -> TestResult {
        let state = SupervisorState::new();
        state.arm()?;
        state.record_tick();
        state.record_tick();
        assert!(state.disarm());
        state.arm()?;
        assert_eq!(state.tick_count(), 2);
        assert_eq!(state.start_count(), 2);
        assert_eq!(state.stop_count(), 1);
        Ok(())
    }
}

mod errors {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StartupError::device_unavailable(
            Region::Timer,
            MapError::AlreadyMapped {
                base: TIMER_BASE,
                size: REGISTER_WINDOW_SIZE,
            },
        );
        assert_eq!(
            err.to_string(),
            "timer registers unavailable: register range 0xc0100000+0x1000 is already mapped"
        );

        assert_eq!(
            StartupError::AlreadyStarted.to_string(),
            "Watchdog supervisor is already started"
        );
        assert!(
            StartupError::invalid_configuration("bad")
                .to_string()
                .contains("bad")
        );
    }

    #[test]
    fn test_device_unavailable_keeps_source() {
        let err = StartupError::device_unavailable(
            Region::Tcsr,
            MapError::InvalidRange {
                base: TCSR_BASE,
                size: 0,
            },
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
