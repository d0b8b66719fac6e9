//! Download-mode diagnostic markers.
//!
//! Writing the two magic words before the watchdog is armed makes the boot
//! loader take the memory-dump path on the next watchdog reset. The write is
//! best effort: callers log the error and carry on arming.

use tracing::{debug, info};

use crate::device::{RegisterBlock, RegisterMapper};
use crate::error::DiagnosticWriteError;
use crate::registers::{
    DLOAD_MAGIC_WRITE1, DLOAD_MAGIC_WRITE2, DLOAD_MODE_ADDR, REGISTER_WIDTH, REGISTER_WINDOW_SIZE,
};

/// The pair of download-mode magic words and where they go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticMarker {
    /// Physical address of the first word.
    pub address: u64,
    /// Words written at `address` and `address + 4`.
    pub magic: [u32; 2],
}

impl DiagnosticMarker {
    /// Marker at `address` with the standard magic words.
    #[must_use]
    pub const fn at(address: u64) -> Self {
        Self {
            address,
            magic: [DLOAD_MAGIC_WRITE1, DLOAD_MAGIC_WRITE2],
        }
    }

    /// Size of the window mapped around the marker.
    #[must_use]
    pub const fn window(&self) -> usize {
        REGISTER_WINDOW_SIZE
    }

    /// Map the diagnostics region, write both words, unmap.
    ///
    /// # Errors
    ///
    /// Returns an error if the region cannot be mapped; nothing is written.
    pub fn write<M: RegisterMapper>(&self, mapper: &M) -> Result<(), DiagnosticWriteError> {
        let [first, second] = self.magic;
        let mut block = mapper.map(self.address, self.window())?;
        debug!(address = format_args!("{:#x}", self.address), "mapped diagnostics region");
        block.write(0, first);
        block.write(REGISTER_WIDTH, second);
        drop(block);
        info!("download-mode diagnostics enabled");
        Ok(())
    }
}

impl Default for DiagnosticMarker {
    fn default() -> Self {
        Self::at(DLOAD_MODE_ADDR)
    }
}
