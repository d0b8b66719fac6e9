//! Safety tests: the watchdog is never left enabled without a heartbeat by
//! an orderly stop, and nothing strobes a disabled watchdog.

#![cfg(test)]

use msm_watchdog::prelude::*;
use msm_watchdog::registers::{REGISTER_WINDOW_SIZE, TCSR_BASE, TCSR_WDT_CFG, TIMER_BASE};
use std::sync::Arc;
use std::time::Duration;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::test(start_paused = true)]
async fn test_no_strobe_after_stop() -> TestResult {
    let mapper = RecordingMapper::new();
    let log = mapper.log();
    let mut supervisor = HeartbeatSupervisor::new(SupervisorConfig::default(), mapper)?;
    supervisor.start()?;

    // stop lands right on top of a pending strobe
    tokio::time::sleep(Duration::from_millis(599)).await;
    supervisor.stop().await;

    let timer_writes = log.register_writes(TIMER_BASE);
    let disable = timer_writes
        .iter()
        .rposition(|&write| write == (Register::Enable, 0))
        .ok_or("enable never cleared")?;
    assert_eq!(disable, timer_writes.len() - 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(log.register_writes(TIMER_BASE).len(), timer_writes.len());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_keeps_strobing_well_inside_bark() -> TestResult {
    let mapper = RecordingMapper::new();
    let log = mapper.log();
    let config = SupervisorConfig::default();
    let bark = config.bark_timeout();
    let mut supervisor = HeartbeatSupervisor::new(config, mapper)?;
    supervisor.start()?;

    // every bark-length window after arming contains at least two strobes
    for _ in 0..10 {
        let before = log.count(TIMER_BASE, Register::ResetStrobe);
        tokio::time::sleep(bark).await;
        let after = log.count(TIMER_BASE, Register::ResetStrobe);
        let strobes = after - before;
        assert!(strobes >= 2, "only {strobes} strobes in one bark period");
    }

    supervisor.stop().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_dropping_armed_supervisor_cancels_heartbeat() -> TestResult {
    let mapper = RecordingMapper::new();
    let log = mapper.log();
    let mut supervisor = HeartbeatSupervisor::new(SupervisorConfig::default(), mapper)?;
    supervisor.start()?;
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(log.count(TIMER_BASE, Register::ResetStrobe), 1);

    drop(supervisor);
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(log.count(TIMER_BASE, Register::ResetStrobe), 1);
    // enable stays set, so the timer window must stay mapped
    assert_eq!(
        log.register_writes(TIMER_BASE).last(),
        Some(&(Register::ResetStrobe, 1))
    );
    assert!(!log.unmaps().contains(&TIMER_BASE));
    assert!(log.unmaps().contains(&TCSR_BASE));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_second_supervisor_cannot_claim_live_registers() -> TestResult {
    let mapper = Arc::new(RecordingMapper::new());
    let mut first =
        HeartbeatSupervisor::new(SupervisorConfig::default(), SharedMapper(Arc::clone(&mapper)))?;
    let mut second =
        HeartbeatSupervisor::new(SupervisorConfig::default(), SharedMapper(Arc::clone(&mapper)))?;

    first.start()?;
    let result = second.start();
    assert!(matches!(result, Err(StartupError::DeviceUnavailable { .. })));
    assert!(!second.is_armed());
    assert_eq!(mapper.log().count(TIMER_BASE, Register::Enable), 1);

    first.stop().await;
    second.start()?;
    assert!(second.is_armed());
    second.stop().await;
    Ok(())
}

/// Lets two supervisors share one recording bus.
#[derive(Debug)]
struct SharedMapper(Arc<RecordingMapper>);

impl RegisterMapper for SharedMapper {
    type Block = msm_watchdog::RecordingBlock;

    fn map(&self, base: u64, size: usize) -> Result<Self::Block, msm_watchdog::MapError> {
        self.0.map(base, size)
    }
}

#[cfg(unix)]
mod dev_mem {
    use super::*;
    use msm_watchdog::registers::{DLOAD_MAGIC_WRITE1, DLOAD_MAGIC_WRITE2};
    use std::io::{Read, Seek, SeekFrom};

    const TIMER: u64 = 0x10000;
    const TCSR: u64 = 0x20000;
    const DIAGNOSTICS: u64 = 0x30008;

    fn read_word(file: &mut tempfile::NamedTempFile, at: u64) -> std::io::Result<u32> {
        let mut bytes = [0u8; 4];
        file.as_file_mut().seek(SeekFrom::Start(at))?;
        file.as_file_mut().read_exact(&mut bytes)?;
        Ok(u32::from_ne_bytes(bytes))
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_over_memory_file() -> TestResult {
        let mut backing = tempfile::NamedTempFile::new()?;
        backing.as_file().set_len(0x40000)?;

        let config = SupervisorConfig::builder()
            .debug_mode(true)
            .timer(TIMER, REGISTER_WINDOW_SIZE)
            .tcsr(Some(TcsrConfig {
                base: TCSR,
                window: REGISTER_WINDOW_SIZE,
            }))
            .diagnostic_base(DIAGNOSTICS)
            .build()?;
        let mut supervisor =
            HeartbeatSupervisor::new(config, DevMemMapper::with_path(backing.path()))?;

        supervisor.start()?;
        tokio::time::sleep(Duration::from_millis(350)).await;
        supervisor.stop().await;

        assert_eq!(read_word(&mut backing, DIAGNOSTICS)?, DLOAD_MAGIC_WRITE1);
        assert_eq!(read_word(&mut backing, DIAGNOSTICS + 4)?, DLOAD_MAGIC_WRITE2);
        assert_eq!(read_word(&mut backing, TCSR + TCSR_WDT_CFG as u64)?, 3);
        assert_eq!(read_word(&mut backing, TIMER + 0x4C)?, 22_000);
        assert_eq!(read_word(&mut backing, TIMER + 0x5C)?, 22_000);
        assert_eq!(read_word(&mut backing, TIMER + 0x38)?, 1);
        assert_eq!(read_word(&mut backing, TIMER + 0x40)?, 0);
        assert_eq!(supervisor.tick_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_memory_device_fails_start() -> TestResult {
        let mut supervisor = HeartbeatSupervisor::new(
            SupervisorConfig::default(),
            DevMemMapper::with_path("/nonexistent/msm-watchdog-mem"),
        )?;
        assert!(matches!(
            supervisor.start(),
            Err(StartupError::DeviceUnavailable { .. })
        ));
        Ok(())
    }
}
