//! Binary <-> ASCII hex conversion.
//!
//! Every byte becomes two lowercase hex characters, high nibble first.

use thiserror::Error;

/// Lowercase hex alphabet used on the wire.
pub const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Codec errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("destination holds {available} bytes, {needed} required")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("invalid hex digit {0:#04x}")]
    InvalidDigit(u8),

    #[error("hex input has odd length {0}")]
    OddLength(usize),
}

/// Hex character for the low nibble of `nibble`.
#[must_use]
pub const fn hex_digit(nibble: u8) -> u8 {
    HEX_DIGITS[(nibble & 0xf) as usize]
}

/// Value of a single hex character, accepting both cases.
#[must_use]
pub const fn hex_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        _ => None,
    }
}

/// Encode `src` as hex into `dst`, returning the number of characters written.
///
/// # Errors
///
/// Fails without writing anything if `dst` is shorter than `2 * src.len()`.
pub fn bin_to_hex(src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
    let needed = src.len() * 2;
    if dst.len() < needed {
        return Err(CodecError::BufferTooSmall {
            needed,
            available: dst.len(),
        });
    }

    for (&byte, pair) in src.iter().zip(dst.chunks_exact_mut(2)) {
        pair[0] = hex_digit(byte >> 4);
        pair[1] = hex_digit(byte);
    }
    Ok(needed)
}

/// Decode hex characters from `src` into `dst`, returning the number of bytes produced.
///
/// # Errors
///
/// Fails on odd-length input, a non-hex character, or a destination shorter
/// than `src.len() / 2`.
pub fn hex_to_bin(src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
    if src.len() % 2 != 0 {
        return Err(CodecError::OddLength(src.len()));
    }
    let needed = src.len() / 2;
    if dst.len() < needed {
        return Err(CodecError::BufferTooSmall {
            needed,
            available: dst.len(),
        });
    }

    for (pair, out) in src.chunks_exact(2).zip(dst.iter_mut()) {
        let hi = hex_value(pair[0]).ok_or(CodecError::InvalidDigit(pair[0]))?;
        let lo = hex_value(pair[1]).ok_or(CodecError::InvalidDigit(pair[1]))?;
        *out = (hi << 4) | lo;
    }
    Ok(needed)
}

/// Parse a non-empty big-endian hex number such as a packet address field.
///
/// Returns `None` on an empty field, a non-hex character or overflow.
#[must_use]
pub fn parse_hex_u64(field: &[u8]) -> Option<u64> {
    if field.is_empty() {
        return None;
    }
    field.iter().try_fold(0u64, |acc, &ch| {
        let digit = u64::from(hex_value(ch)?);
        acc.checked_mul(16)?.checked_add(digit)
    })
}
