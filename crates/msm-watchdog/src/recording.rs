//! Recording register mapper.
//!
//! This module provides [`RecordingMapper`], an in-memory implementation of
//! [`RegisterMapper`] for tests and hardware-free dry runs. Every map, write
//! and unmap is appended to a shared [`BusLog`], and mapping can be made to
//! fail for chosen physical bases.
//!
//! # Example
//!
//! ```rust
//! use msm_watchdog::{RecordingMapper, Register, WatchdogDevice};
//! use msm_watchdog::registers::{REGISTER_WINDOW_SIZE, TIMER_BASE};
//!
//! let mapper = RecordingMapper::new();
//! let mut device = WatchdogDevice::map(&mapper, TIMER_BASE, REGISTER_WINDOW_SIZE)
//!     .expect("recording mapper never fails unless told to");
//! device.strobe();
//!
//! assert_eq!(mapper.log().count(TIMER_BASE, Register::ResetStrobe), 1);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::{RegisterBlock, RegisterMapper, Reservation, Reservations};
use crate::error::MapError;
use crate::registers::Register;

/// One recorded register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    /// Physical base of the window written through.
    pub base: u64,
    /// Byte offset inside the window.
    pub offset: usize,
    /// Value written.
    pub value: u32,
}

/// Bus activity seen by a [`RecordingMapper`], in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    /// A window was mapped.
    Map {
        /// Physical base address.
        base: u64,
        /// Window size in bytes.
        size: usize,
    },
    /// A register was written.
    Write(RegisterWrite),
    /// A window was unmapped.
    Unmap {
        /// Physical base address.
        base: u64,
    },
}

/// Shared, ordered log of bus events.
#[derive(Debug, Clone, Default)]
pub struct BusLog {
    events: Arc<Mutex<Vec<BusEvent>>>,
}

impl BusLog {
    fn push(&self, event: BusEvent) {
        self.events.lock().push(event);
    }

    /// Snapshot of every event so far.
    #[must_use]
    pub fn events(&self) -> Vec<BusEvent> {
        self.events.lock().clone()
    }

    /// Every register write, across all windows.
    #[must_use]
    pub fn writes(&self) -> Vec<RegisterWrite> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                BusEvent::Write(write) => Some(*write),
                _ => None,
            })
            .collect()
    }

    /// `(offset, value)` pairs written through the window at `base`.
    #[must_use]
    pub fn writes_to(&self, base: u64) -> Vec<(usize, u32)> {
        self.writes()
            .into_iter()
            .filter(|w| w.base == base)
            .map(|w| (w.offset, w.value))
            .collect()
    }

    /// Watchdog register writes through the timer window at `base`.
    ///
    /// Offsets that are not watchdog registers are skipped.
    #[must_use]
    pub fn register_writes(&self, base: u64) -> Vec<(Register, u32)> {
        self.writes_to(base)
            .into_iter()
            .filter_map(|(offset, value)| Register::from_offset(offset).map(|r| (r, value)))
            .collect()
    }

    /// How many times `register` was written through the window at `base`.
    #[must_use]
    pub fn count(&self, base: u64, register: Register) -> usize {
        self.writes()
            .iter()
            .filter(|w| w.base == base && w.offset == register.offset())
            .count()
    }

    /// Total number of register writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes().len()
    }

    /// `(base, size)` of every mapping made, in order.
    #[must_use]
    pub fn maps(&self) -> Vec<(u64, usize)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                BusEvent::Map { base, size } => Some((*base, *size)),
                _ => None,
            })
            .collect()
    }

    /// Base of every mapping released, in order.
    #[must_use]
    pub fn unmaps(&self) -> Vec<u64> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                BusEvent::Unmap { base } => Some(*base),
                _ => None,
            })
            .collect()
    }

    /// Position of the first write matching `pred`, if any.
    #[must_use]
    pub fn position(&self, pred: impl Fn(&RegisterWrite) -> bool) -> Option<usize> {
        self.writes().iter().position(pred)
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

/// In-memory [`RegisterMapper`] that records all bus activity.
#[derive(Debug, Default)]
pub struct RecordingMapper {
    log: BusLog,
    reservations: Reservations,
    failing: Mutex<Vec<u64>>,
}

impl RecordingMapper {
    /// Create a mapper with an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future mapping at `base` fail.
    #[must_use]
    pub fn failing_at(self, base: u64) -> Self {
        self.fail_at(base);
        self
    }

    /// Make every future mapping at `base` fail.
    pub fn fail_at(&self, base: u64) {
        self.failing.lock().push(base);
    }

    /// Let mappings at `base` succeed again.
    pub fn recover(&self, base: u64) {
        self.failing.lock().retain(|&b| b != base);
    }

    /// Handle to the shared event log.
    #[must_use]
    pub fn log(&self) -> BusLog {
        self.log.clone()
    }

    /// Ranges currently mapped through this mapper.
    #[must_use]
    pub fn reservations(&self) -> &Reservations {
        &self.reservations
    }
}

impl RegisterMapper for RecordingMapper {
    type Block = RecordingBlock;

    fn map(&self, base: u64, size: usize) -> Result<Self::Block, MapError> {
        if self.failing.lock().contains(&base) {
            return Err(MapError::os(
                base,
                size,
                std::io::Error::from(std::io::ErrorKind::OutOfMemory),
            ));
        }
        let reservation = self.reservations.reserve(base, size)?;
        self.log.push(BusEvent::Map { base, size });
        Ok(RecordingBlock {
            base,
            size,
            log: self.log.clone(),
            _reservation: reservation,
        })
    }
}

/// Window produced by [`RecordingMapper`].
#[derive(Debug)]
pub struct RecordingBlock {
    base: u64,
    size: usize,
    log: BusLog,
    _reservation: Reservation,
}

impl RegisterBlock for RecordingBlock {
    fn base(&self) -> u64 {
        self.base
    }

    fn size(&self) -> usize {
        self.size
    }

    fn write(&mut self, offset: usize, value: u32) {
        self.log.push(BusEvent::Write(RegisterWrite {
            base: self.base,
            offset,
            value,
        }));
    }
}

impl Drop for RecordingBlock {
    fn drop(&mut self) {
        self.log.push(BusEvent::Unmap { base: self.base });
    }
}
