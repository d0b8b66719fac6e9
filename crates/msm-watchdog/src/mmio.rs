//! `/dev/mem` register mapper for Linux targets.
//!
//! Windows are mapped `MAP_SHARED` from a descriptor opened with `O_SYNC`,
//! which the kernel turns into an uncached, non-speculative device mapping.
//! Physical bases do not have to be page aligned (the download-mode words sit
//! at `+0x008` of their page); the in-page offset is kept and applied on every
//! access.

#![expect(unsafe_code, reason = "mmap/munmap and volatile stores into the mapped window")]

use std::fs::OpenOptions;
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use tracing::{error, warn};

use crate::device::{RegisterBlock, RegisterMapper, Reservation, Reservations};
use crate::error::MapError;
use crate::registers::REGISTER_WIDTH;

/// Default physical memory device.
pub const DEV_MEM: &str = "/dev/mem";

const FALLBACK_PAGE_SIZE: u64 = 4096;

fn page_size() -> u64 {
    // SAFETY: `sysconf` only reads a system constant.
    let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    u64::try_from(raw)
        .ok()
        .filter(|&size| size > 0)
        .unwrap_or(FALLBACK_PAGE_SIZE)
}

#[cfg(any(all(target_os = "linux", target_env = "gnu"), target_os = "android"))]
fn map_shared(fd: libc::c_int, len: usize, offset: u64) -> Option<*mut libc::c_void> {
    let offset = libc::off64_t::try_from(offset).ok()?;
    // SAFETY: a fresh mapping at a kernel-chosen address cannot alias
    // existing Rust objects; `fd` is open for the duration of the call.
    let ptr = unsafe {
        libc::mmap64(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            offset,
        )
    };
    Some(ptr)
}

#[cfg(not(any(all(target_os = "linux", target_env = "gnu"), target_os = "android")))]
fn map_shared(fd: libc::c_int, len: usize, offset: u64) -> Option<*mut libc::c_void> {
    let offset = libc::off_t::try_from(offset).ok()?;
    // SAFETY: a fresh mapping at a kernel-chosen address cannot alias
    // existing Rust objects; `fd` is open for the duration of the call.
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            offset,
        )
    };
    Some(ptr)
}

/// Maps physical register windows through `/dev/mem`.
#[derive(Debug)]
pub struct DevMemMapper {
    path: PathBuf,
    reservations: Reservations,
}

impl DevMemMapper {
    /// Mapper over [`DEV_MEM`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_path(DEV_MEM)
    }

    /// Mapper over another memory device or file.
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reservations: Reservations::new(),
        }
    }

    /// Path of the backing device.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for DevMemMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterMapper for DevMemMapper {
    type Block = MmioBlock;

    fn map(&self, base: u64, size: usize) -> Result<Self::Block, MapError> {
        let invalid = || MapError::InvalidRange { base, size };
        if base % REGISTER_WIDTH as u64 != 0 {
            return Err(invalid());
        }
        let reservation = self.reservations.reserve(base, size)?;

        let page_offset = base % page_size();
        let aligned_base = base.checked_sub(page_offset).ok_or_else(invalid)?;
        let page_offset = usize::try_from(page_offset).ok().ok_or_else(invalid)?;
        let map_len = page_offset.checked_add(size).ok_or_else(invalid)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(&self.path)
            .map_err(|source| MapError::os(base, size, source))?;

        let ptr = map_shared(file.as_raw_fd(), map_len, aligned_base).ok_or_else(invalid)?;
        if ptr == libc::MAP_FAILED {
            return Err(MapError::os(base, size, io::Error::last_os_error()));
        }
        let mapping = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| MapError::os(base, size, io::Error::other("mmap returned null")))?;

        Ok(MmioBlock {
            mapping,
            map_len,
            page_offset,
            base,
            size,
            _reservation: reservation,
        })
    }
}

/// A window mapped by [`DevMemMapper`]. Unmapped on drop.
#[derive(Debug)]
pub struct MmioBlock {
    mapping: NonNull<u8>,
    map_len: usize,
    page_offset: usize,
    base: u64,
    size: usize,
    _reservation: Reservation,
}

// SAFETY: the block exclusively owns its mapping and only writes through
// `&mut self`, so moving it to another thread cannot introduce aliasing.
unsafe impl Send for MmioBlock {}

impl RegisterBlock for MmioBlock {
    fn base(&self) -> u64 {
        self.base
    }

    fn size(&self) -> usize {
        self.size
    }

    fn write(&mut self, offset: usize, value: u32) {
        let in_window = offset % REGISTER_WIDTH == 0
            && offset
                .checked_add(REGISTER_WIDTH)
                .is_some_and(|end| end <= self.size);
        let Some(byte_offset) = self.page_offset.checked_add(offset).filter(|_| in_window) else {
            error!(
                base = format_args!("{:#x}", self.base),
                offset, "register write outside mapped window dropped"
            );
            return;
        };
        // SAFETY: `byte_offset + REGISTER_WIDTH <= page_offset + size == map_len`,
        // so the pointer stays inside the live mapping.
        let register = unsafe { self.mapping.as_ptr().add(byte_offset) };
        // SAFETY: the mapping is page aligned and both the base and `offset`
        // are multiples of four, so `register` is a valid, aligned `u32` slot.
        unsafe { register.cast::<u32>().write_volatile(value) };
    }
}

impl Drop for MmioBlock {
    fn drop(&mut self) {
        // SAFETY: `mapping` and `map_len` come from one successful mmap and
        // are released exactly once, here.
        let rc = unsafe { libc::munmap(self.mapping.as_ptr().cast(), self.map_len) };
        if rc != 0 {
            warn!(
                base = format_args!("{:#x}", self.base),
                error = %io::Error::last_os_error(),
                "munmap failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom};

    const BACKING_LEN: u64 = 0x40000;

    fn backing_file() -> io::Result<tempfile::NamedTempFile> {
        let file = tempfile::NamedTempFile::new()?;
        file.as_file().set_len(BACKING_LEN)?;
        Ok(file)
    }

    fn read_word(file: &mut tempfile::NamedTempFile, at: u64) -> io::Result<u32> {
        let mut bytes = [0u8; 4];
        file.as_file_mut().seek(SeekFrom::Start(at))?;
        file.as_file_mut().read_exact(&mut bytes)?;
        Ok(u32::from_ne_bytes(bytes))
    }

    #[test]
    fn test_writes_land_at_register_offset() -> Result<(), Box<dyn std::error::Error>> {
        let mut backing = backing_file()?;
        let mapper = DevMemMapper::with_path(backing.path());
        assert_eq!(mapper.path(), backing.path());

        let mut block = mapper.map(0x10000, 0x1000)?;
        block.write(0x38, 1);
        block.write(0x4C, 22_000);
        drop(block);

        assert_eq!(read_word(&mut backing, 0x10038)?, 1);
        assert_eq!(read_word(&mut backing, 0x1004C)?, 22_000);
        Ok(())
    }

    #[test]
    fn test_unaligned_base_keeps_in_page_offset() -> Result<(), Box<dyn std::error::Error>> {
        let mut backing = backing_file()?;
        let mapper = DevMemMapper::with_path(backing.path());

        let mut block = mapper.map(0x20008, 8)?;
        assert_eq!((block.base(), block.size()), (0x20008, 8));
        block.write(0, 0xE47B_337D);
        block.write(4, 0xCE14_091A);
        drop(block);

        assert_eq!(read_word(&mut backing, 0x20008)?, 0xE47B_337D);
        assert_eq!(read_word(&mut backing, 0x2000C)?, 0xCE14_091A);
        Ok(())
    }

    #[test]
    fn test_out_of_window_write_is_dropped() -> Result<(), Box<dyn std::error::Error>> {
        let mut backing = backing_file()?;
        let mapper = DevMemMapper::with_path(backing.path());

        let mut block = mapper.map(0x10000, 8)?;
        block.write(8, 0xDEAD_BEEF);
        block.write(2, 0xDEAD_BEEF);
        drop(block);

        assert_eq!(read_word(&mut backing, 0x10008)?, 0);
        assert_eq!(read_word(&mut backing, 0x10000)?, 0);
        Ok(())
    }

    #[test]
    fn test_misaligned_base_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let backing = backing_file()?;
        let mapper = DevMemMapper::with_path(backing.path());
        assert!(matches!(
            mapper.map(0x10002, 0x100),
            Err(MapError::InvalidRange { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_live_range_cannot_be_mapped_twice() -> Result<(), Box<dyn std::error::Error>> {
        let backing = backing_file()?;
        let mapper = DevMemMapper::with_path(backing.path());

        let block = mapper.map(0x10000, 0x1000)?;
        assert!(matches!(
            mapper.map(0x10800, 0x10),
            Err(MapError::AlreadyMapped { .. })
        ));
        drop(block);
        assert!(mapper.map(0x10800, 0x10).is_ok());
        Ok(())
    }

    #[test]
    fn test_missing_device_reports_os_error() {
        let mapper = DevMemMapper::with_path("/nonexistent/msm-watchdog-mem");
        assert!(matches!(
            mapper.map(0x10000, 0x1000),
            Err(MapError::Os { .. })
        ));
    }
}
