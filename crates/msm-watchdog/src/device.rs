//! Register interface: mapping traits and the typed watchdog device.
//!
//! A [`RegisterMapper`] turns a physical range into a [`RegisterBlock`];
//! dropping the block unmaps it. [`WatchdogDevice`] wraps the timer block and
//! only exposes the writes the heartbeat needs.
//!
//! # Write Semantics
//!
//! Every write is a single synchronous 32-bit store. Nothing is buffered
//! between calls, so the bark, bite and enable writes reach the hardware in
//! program order.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::error::MapError;
use crate::registers::{ENABLE_BARK_AND_BITE, ENABLE_OFF, RESET_STROBE_VALUE, Register};

/// A mapped window of 32-bit device registers.
///
/// Implementations must perform each write immediately (uncached, no write
/// combining) and release the mapping when dropped.
pub trait RegisterBlock: Send + core::fmt::Debug {
    /// Physical base address of the window.
    fn base(&self) -> u64;

    /// Window size in bytes.
    fn size(&self) -> usize;

    /// Write one 32-bit register at `offset` bytes from the base.
    fn write(&mut self, offset: usize, value: u32);
}

/// Source of register windows.
pub trait RegisterMapper: Send + Sync + core::fmt::Debug {
    /// Block type produced by this mapper.
    type Block: RegisterBlock + 'static;

    /// Map `size` bytes of physical address space starting at `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is invalid, overlaps a live mapping
    /// from this mapper, or cannot be mapped by the platform.
    fn map(&self, base: u64, size: usize) -> Result<Self::Block, MapError>;
}

/// Reject empty ranges and ranges that wrap the address space.
///
/// # Errors
///
/// Returns [`MapError::InvalidRange`] for such ranges.
pub fn check_range(base: u64, size: usize) -> Result<(), MapError> {
    let wraps = u64::try_from(size)
        .ok()
        .and_then(|len| base.checked_add(len))
        .is_none();
    if size == 0 || wraps {
        return Err(MapError::InvalidRange { base, size });
    }
    Ok(())
}

#[derive(Debug, Default)]
struct ReservationTable {
    next_id: u64,
    live: Vec<(u64, u64, usize)>,
}

/// Address ranges currently held by live mappings.
///
/// Shared by clones; a mapper keeps one so a second mapping of the same
/// registers is refused while the first is alive.
#[derive(Debug, Clone, Default)]
pub struct Reservations {
    table: Arc<Mutex<ReservationTable>>,
}

impl Reservations {
    /// Create an empty reservation table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `[base, base + size)` until the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is invalid or overlaps a live reservation.
    pub fn reserve(&self, base: u64, size: usize) -> Result<Reservation, MapError> {
        check_range(base, size)?;
        let mut table = self.table.lock();
        let overlaps = table.live.iter().any(|&(_, live_base, live_size)| {
            crate::registers::ranges_overlap(base, size, live_base, live_size)
        });
        if overlaps {
            return Err(MapError::AlreadyMapped { base, size });
        }
        let id = table.next_id;
        table.next_id = table.next_id.wrapping_add(1);
        table.live.push((id, base, size));
        Ok(Reservation {
            id,
            table: Arc::clone(&self.table),
        })
    }

    /// Number of live reservations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().live.len()
    }

    /// Whether no range is reserved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Guard for one reserved range.
#[derive(Debug)]
pub struct Reservation {
    id: u64,
    table: Arc<Mutex<ReservationTable>>,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.table.lock().live.retain(|&(id, _, _)| id != self.id);
    }
}

/// The watchdog registers of a mapped timer block.
///
/// Tracks whether the enable register is set so that the window cannot be
/// unmapped while the hardware is still counting.
#[derive(Debug)]
pub struct WatchdogDevice<B: RegisterBlock> {
    block: B,
    armed: bool,
}

impl<B: RegisterBlock> WatchdogDevice<B> {
    /// Map the timer block through `mapper`.
    ///
    /// # Errors
    ///
    /// Returns an error if the window is too small for the watchdog
    /// registers or the mapper fails.
    pub fn map<M>(mapper: &M, base: u64, size: usize) -> Result<Self, MapError>
    where
        M: RegisterMapper<Block = B>,
    {
        if size < Register::min_window() {
            return Err(MapError::InvalidRange { base, size });
        }
        let block = mapper.map(base, size)?;
        debug!(base = format_args!("{base:#x}"), size, "mapped watchdog registers");
        Ok(Self::new(block))
    }

    /// Wrap an already mapped timer block.
    #[must_use]
    pub fn new(block: B) -> Self {
        Self {
            block,
            armed: false,
        }
    }

    /// Write a watchdog register.
    pub fn write_register(&mut self, register: Register, value: u32) {
        trace!(register = register.as_str(), value, "register write");
        self.block.write(register.offset(), value);
    }

    /// Program the bark threshold.
    pub fn set_bark_ticks(&mut self, ticks: u32) {
        self.write_register(Register::BarkTime, ticks);
    }

    /// Program the bite threshold.
    pub fn set_bite_ticks(&mut self, ticks: u32) {
        self.write_register(Register::BiteTime, ticks);
    }

    /// Enable bark and bite. The countdown starts from here.
    pub fn enable(&mut self) {
        self.write_register(Register::Enable, ENABLE_BARK_AND_BITE);
        self.armed = true;
    }

    /// Clear the enable register.
    pub fn disable(&mut self) {
        self.write_register(Register::Enable, ENABLE_OFF);
        self.armed = false;
    }

    /// Restart the countdown without touching the thresholds.
    #[inline]
    pub fn strobe(&mut self) {
        self.write_register(Register::ResetStrobe, RESET_STROBE_VALUE);
    }

    /// Whether the enable register was last written with bark and bite on.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Physical base of the timer block.
    #[must_use]
    pub fn base(&self) -> u64 {
        self.block.base()
    }

    /// Release the mapping.
    ///
    /// # Errors
    ///
    /// Refuses while the watchdog is enabled, handing the device back so the
    /// caller can disable it first.
    pub fn unmap(self) -> Result<(), UnmapError<B>> {
        if self.armed {
            return Err(UnmapError { device: self });
        }
        debug!(
            base = format_args!("{:#x}", self.base()),
            size = self.block.size(),
            "unmapped watchdog registers"
        );
        Ok(())
    }
}

impl<B: RegisterBlock> Drop for WatchdogDevice<B> {
    fn drop(&mut self) {
        if self.armed {
            warn!(
                base = format_args!("{:#x}", self.base()),
                "watchdog registers released while the watchdog is still enabled"
            );
        }
    }
}

/// Returned by [`WatchdogDevice::unmap`] when the watchdog is still enabled.
#[derive(Debug, Error)]
#[error("cannot unmap watchdog registers while the watchdog is enabled")]
pub struct UnmapError<B: RegisterBlock> {
    device: WatchdogDevice<B>,
}

impl<B: RegisterBlock> UnmapError<B> {
    /// Take back the still-mapped device.
    #[must_use]
    pub fn into_device(self) -> WatchdogDevice<B> {
        self.device
    }
}
