//! Hex-encoded memory reads and writes.
//!
//! Alignment 1 moves one byte per bus transaction. Alignment 2 or 4 moves
//! whole aligned units: reads pick the wanted bytes out of each unit, writes
//! read the unit, patch the targeted bytes and store the whole unit back.

use rsp_wire::{CodecError, bin_to_hex, hex_to_bin, hex_value};
use thiserror::Error;
use tracing::trace;

use crate::bus::{BusFault, MemoryBus};
use crate::region::MemoryMap;

/// Memory access errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    #[error("{len}-byte access needs {needed} hex characters, buffer holds {available}")]
    BufferTooSmall {
        len: usize,
        needed: usize,
        available: usize,
    },

    #[error("{len}-byte write carries {extra} hex characters too many")]
    TrailingData { len: usize, extra: usize },

    #[error("access to {len} bytes at {addr:#x} denied by memory map")]
    Denied { addr: u64, len: usize },

    #[error("invalid hex data: {0}")]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Fault(#[from] BusFault),
}

/// Read `len` bytes at `addr` as hex into `dst`, returning the characters written.
///
/// # Errors
///
/// `dst` shorter than `2 * len`, a range the map does not permit for
/// reading, or a bus fault.
pub fn read_memory<B: MemoryBus + ?Sized>(
    map: &MemoryMap,
    bus: &mut B,
    addr: u64,
    len: usize,
    dst: &mut [u8],
) -> Result<usize, AccessError> {
    let needed = hex_len(len, dst.len())?;
    let denied = AccessError::Denied { addr, len };
    let align = map.can_read(addr, len).ok_or(denied)?;
    trace!(addr, len, align, "reading target memory");

    let mut done = 0usize;
    for_each_unit(addr, len, align, |unit_addr, pos, count| {
        let unit = load_unit(bus, unit_addr, align)?;
        let hex = &mut dst[done * 2..(done + count) * 2];
        bin_to_hex(&unit[pos..pos + count], hex)?;
        done += count;
        Ok(())
    })?;
    Ok(needed)
}

/// Write `len` bytes decoded from the hex in `src` to `addr`, returning the bytes written.
///
/// `src` must hold exactly `2 * len` hex characters. The hex is validated
/// before the first store, so malformed input never leaves memory
/// partially written.
///
/// # Errors
///
/// `src` of the wrong length, non-hex input, a range the map does not
/// permit for writing, or a bus fault.
pub fn write_memory<B: MemoryBus + ?Sized>(
    map: &MemoryMap,
    bus: &mut B,
    src: &[u8],
    addr: u64,
    len: usize,
) -> Result<usize, AccessError> {
    let needed = hex_len(len, src.len())?;
    if src.len() > needed {
        return Err(AccessError::TrailingData {
            len,
            extra: src.len() - needed,
        });
    }
    if let Some(&bad) = src.iter().find(|&&ch| hex_value(ch).is_none()) {
        return Err(CodecError::InvalidDigit(bad).into());
    }
    let denied = AccessError::Denied { addr, len };
    let align = map.can_write(addr, len).ok_or(denied)?;
    trace!(addr, len, align, "writing target memory");

    let mut done = 0usize;
    for_each_unit(addr, len, align, |unit_addr, pos, count| {
        let mut unit = if align == 1 {
            [0u8; 4]
        } else {
            load_unit(bus, unit_addr, align)?
        };
        let hex = &src[done * 2..(done + count) * 2];
        hex_to_bin(hex, &mut unit[pos..pos + count])?;
        store_unit(bus, unit_addr, align, unit)?;
        done += count;
        Ok(())
    })?;
    Ok(len)
}

fn hex_len(len: usize, available: usize) -> Result<usize, AccessError> {
    let needed = len.saturating_mul(2);
    if available < needed {
        return Err(AccessError::BufferTooSmall {
            len,
            needed,
            available,
        });
    }
    Ok(needed)
}

/// Walk `[addr, addr + len)` one aligned unit at a time, passing the unit
/// address, the offset of the first wanted byte in it, and the wanted count.
fn for_each_unit(
    addr: u64,
    len: usize,
    align: usize,
    mut f: impl FnMut(u64, usize, usize) -> Result<(), AccessError>,
) -> Result<(), AccessError> {
    let step = align as u64;
    let mask = step - 1;
    let mut unit_addr = addr & !mask;
    #[allow(clippy::cast_possible_truncation)]
    let mut pos = (addr & mask) as usize;
    let mut remaining = len;

    while remaining > 0 {
        let count = (align - pos).min(remaining);
        f(unit_addr, pos, count)?;
        remaining -= count;
        pos = 0;
        unit_addr = unit_addr.wrapping_add(step);
    }
    Ok(())
}

fn load_unit<B: MemoryBus + ?Sized>(
    bus: &mut B,
    addr: u64,
    align: usize,
) -> Result<[u8; 4], BusFault> {
    let mut unit = [0u8; 4];
    match align {
        4 => unit = bus.read_u32(addr)?.to_ne_bytes(),
        2 => unit[..2].copy_from_slice(&bus.read_u16(addr)?.to_ne_bytes()),
        _ => unit[0] = bus.read_u8(addr)?,
    }
    Ok(unit)
}

fn store_unit<B: MemoryBus + ?Sized>(
    bus: &mut B,
    addr: u64,
    align: usize,
    unit: [u8; 4],
) -> Result<(), BusFault> {
    match align {
        4 => bus.write_u32(addr, u32::from_ne_bytes(unit)),
        2 => bus.write_u16(addr, u16::from_ne_bytes([unit[0], unit[1]])),
        _ => bus.write_u8(addr, unit[0]),
    }
}
