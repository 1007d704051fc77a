//! Guard-paged RAM for the simulated target.
//!
//! The host mapping is `[GUARD][RAM][GUARD]` with the guards `PROT_NONE`, so
//! a bounds bug in the bus turns into a host fault instead of silent
//! corruption of neighbouring memory.

use std::ffi::c_void;
use std::num::NonZeroUsize;
use std::ptr::NonNull;

use nix::sys::mman::{MapFlags, ProtFlags, mmap_anonymous, mprotect, munmap};
use rsp_mem::{BusFault, MemoryBus};
use thiserror::Error;
use tracing::trace;

/// Guard size on each side of the RAM (16KB, at least one page).
pub const GUARD_SIZE: usize = 1 << 14;

/// RAM allocation and loading errors.
#[derive(Debug, Error)]
pub enum RamError {
    #[error("mmap failed: {0}")]
    MmapFailed(#[from] nix::Error),

    #[error("invalid RAM size: {0}")]
    InvalidSize(usize),

    #[error("RAM at {base:#x} with size {size:#x} wraps the address space")]
    AddressWrap { base: u64, size: usize },

    #[error("{len} bytes at {addr:#x} fall outside RAM")]
    OutOfRange { addr: u64, len: usize },
}

/// Target RAM at `[base, base + size)`, backed by a private anonymous mapping.
pub struct GuardedRam {
    region: NonNull<c_void>,
    total_size: usize,
    base: u64,
    size: usize,
}

impl GuardedRam {
    /// Map `size` zeroed bytes that the target sees at `base`.
    ///
    /// # Errors
    ///
    /// Zero or oversized `size`, a range that wraps, or mmap failure.
    pub fn new(base: u64, size: usize) -> Result<Self, RamError> {
        if size == 0 {
            return Err(RamError::InvalidSize(size));
        }
        u64::try_from(size)
            .ok()
            .and_then(|s| base.checked_add(s))
            .ok_or(RamError::AddressWrap { base, size })?;

        let total_size = size
            .checked_add(2 * GUARD_SIZE)
            .ok_or(RamError::InvalidSize(size))?;
        let total_size_nz = NonZeroUsize::new(total_size).ok_or(RamError::InvalidSize(size))?;

        // SAFETY: fresh anonymous mapping, no existing memory is affected.
        let region = unsafe {
            mmap_anonymous(
                None,
                total_size_nz,
                ProtFlags::PROT_NONE,
                MapFlags::MAP_PRIVATE | MapFlags::MAP_NORESERVE,
            )?
        };

        let ram = Self {
            region,
            total_size,
            base,
            size,
        };
        // SAFETY: the RAM window lies strictly inside the mapping.
        unsafe {
            mprotect(
                ram.window(),
                size,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
            )?;
        }
        trace!(base, size, "mapped guarded RAM");
        Ok(ram)
    }

    #[must_use]
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// Copy `data` into RAM at target address `addr`.
    ///
    /// # Errors
    ///
    /// Any part of the range lies outside RAM.
    pub fn load(&mut self, addr: u64, data: &[u8]) -> Result<(), RamError> {
        let len = data.len();
        let outside = RamError::OutOfRange { addr, len };
        let offset = self.offset(addr, len).ok_or(outside)?;
        // SAFETY: `offset` checked the whole range against the RAM window.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.host_ptr(offset), len);
        }
        Ok(())
    }

    /// Offset of `[addr, addr + len)` into the RAM window, if fully inside it.
    fn offset(&self, addr: u64, len: usize) -> Option<usize> {
        let offset = usize::try_from(addr.checked_sub(self.base)?).ok()?;
        (offset.checked_add(len)? <= self.size).then_some(offset)
    }

    const fn window(&self) -> NonNull<c_void> {
        // SAFETY: GUARD_SIZE is within the mapping.
        unsafe { self.region.byte_add(GUARD_SIZE) }
    }

    const fn host_ptr(&self, offset: usize) -> *mut u8 {
        // SAFETY: callers pass offsets validated by `offset`.
        unsafe { self.window().as_ptr().cast::<u8>().add(offset) }
    }

    fn load_unit<const N: usize>(&self, addr: u64) -> Result<[u8; N], BusFault> {
        #[allow(clippy::cast_possible_truncation)]
        let width = N as u8;
        let offset = self.offset(addr, N).ok_or(BusFault { addr, width })?;
        let ptr = self.host_ptr(offset).cast::<[u8; N]>();
        // SAFETY: range checked; unaligned reads are allowed.
        Ok(unsafe { ptr.read_unaligned() })
    }

    fn store_unit<const N: usize>(&mut self, addr: u64, raw: [u8; N]) -> Result<(), BusFault> {
        #[allow(clippy::cast_possible_truncation)]
        let width = N as u8;
        let offset = self.offset(addr, N).ok_or(BusFault { addr, width })?;
        let ptr = self.host_ptr(offset).cast::<[u8; N]>();
        // SAFETY: as above.
        unsafe { ptr.write_unaligned(raw) };
        Ok(())
    }
}

impl MemoryBus for GuardedRam {
    fn read_u8(&mut self, addr: u64) -> Result<u8, BusFault> {
        self.load_unit::<1>(addr).map(|[b]| b)
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> Result<(), BusFault> {
        self.store_unit(addr, [value])
    }

    fn read_u16(&mut self, addr: u64) -> Result<u16, BusFault> {
        self.load_unit(addr).map(u16::from_ne_bytes)
    }

    fn write_u16(&mut self, addr: u64, value: u16) -> Result<(), BusFault> {
        self.store_unit(addr, value.to_ne_bytes())
    }

    fn read_u32(&mut self, addr: u64) -> Result<u32, BusFault> {
        self.load_unit(addr).map(u32::from_ne_bytes)
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> Result<(), BusFault> {
        self.store_unit(addr, value.to_ne_bytes())
    }
}

impl Drop for GuardedRam {
    fn drop(&mut self) {
        // SAFETY: `region` and `total_size` describe our own mapping.
        unsafe {
            let _ = munmap(self.region, self.total_size);
        }
    }
}

// GuardedRam owns its mapping exclusively.
unsafe impl Send for GuardedRam {}
