//! Bus access primitives.

use thiserror::Error;

/// A bus transaction hit an address with nothing behind it.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("bus fault at {addr:#x} ({width}-byte access)")]
pub struct BusFault {
    pub addr: u64,
    pub width: u8,
}

/// Native-width loads and stores on the target's address space.
///
/// Each call is a single bus transaction. Multi-byte units use the target's
/// native byte order; callers look at their raw bytes with `to_ne_bytes`
/// and never interpret them as numbers.
pub trait MemoryBus {
    /// Load one byte.
    ///
    /// # Errors
    ///
    /// Nothing is mapped at `addr`.
    fn read_u8(&mut self, addr: u64) -> Result<u8, BusFault>;

    /// Store one byte.
    ///
    /// # Errors
    ///
    /// Nothing is mapped at `addr`.
    fn write_u8(&mut self, addr: u64, value: u8) -> Result<(), BusFault>;

    /// Load a 16-bit unit from a 2-byte aligned address.
    ///
    /// # Errors
    ///
    /// Nothing is mapped at `addr`.
    fn read_u16(&mut self, addr: u64) -> Result<u16, BusFault>;

    /// Store a 16-bit unit to a 2-byte aligned address.
    ///
    /// # Errors
    ///
    /// Nothing is mapped at `addr`.
    fn write_u16(&mut self, addr: u64, value: u16) -> Result<(), BusFault>;

    /// Load a 32-bit unit from a 4-byte aligned address.
    ///
    /// # Errors
    ///
    /// Nothing is mapped at `addr`.
    fn read_u32(&mut self, addr: u64) -> Result<u32, BusFault>;

    /// Store a 32-bit unit to a 4-byte aligned address.
    ///
    /// # Errors
    ///
    /// Nothing is mapped at `addr`.
    fn write_u32(&mut self, addr: u64, value: u32) -> Result<(), BusFault>;
}

/// Direct volatile access to the current address space.
///
/// Target addresses are host pointers. This is what a stub running on the
/// debugged core itself uses; the memory map is the only protection.
pub struct RawBus {
    _private: (),
}

impl RawBus {
    /// # Safety
    ///
    /// Every address the stub's memory map permits must be mapped, and
    /// accessible at the widths the map's alignments imply. With an empty
    /// map that means the whole address space.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }

    fn ptr<T>(addr: u64, width: u8) -> Result<*mut T, BusFault> {
        let Ok(host) = usize::try_from(addr) else {
            return Err(BusFault { addr, width });
        };
        Ok(host as *mut T)
    }
}

impl MemoryBus for RawBus {
    fn read_u8(&mut self, addr: u64) -> Result<u8, BusFault> {
        let ptr = Self::ptr::<u8>(addr, 1)?;
        // SAFETY: RawBus::new contract.
        Ok(unsafe { ptr.read_volatile() })
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> Result<(), BusFault> {
        let ptr = Self::ptr::<u8>(addr, 1)?;
        // SAFETY: RawBus::new contract.
        unsafe { ptr.write_volatile(value) };
        Ok(())
    }

    fn read_u16(&mut self, addr: u64) -> Result<u16, BusFault> {
        let ptr = Self::ptr::<u16>(addr, 2)?;
        // SAFETY: RawBus::new contract; the access engine only issues aligned units.
        Ok(unsafe { ptr.read_volatile() })
    }

    fn write_u16(&mut self, addr: u64, value: u16) -> Result<(), BusFault> {
        let ptr = Self::ptr::<u16>(addr, 2)?;
        // SAFETY: as above.
        unsafe { ptr.write_volatile(value) };
        Ok(())
    }

    fn read_u32(&mut self, addr: u64) -> Result<u32, BusFault> {
        let ptr = Self::ptr::<u32>(addr, 4)?;
        // SAFETY: as above.
        Ok(unsafe { ptr.read_volatile() })
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> Result<(), BusFault> {
        let ptr = Self::ptr::<u32>(addr, 4)?;
        // SAFETY: as above.
        unsafe { ptr.write_volatile(value) };
        Ok(())
    }
}
