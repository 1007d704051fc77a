//! Parsing of command-line configuration values.

use std::io;
use std::path::{Path, PathBuf};

use rsp_mem::{MemoryRegion, Permissions, RegionError};
use thiserror::Error;

/// Configuration value errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid hex number '{0}'")]
    BadNumber(String),

    #[error("expected START..END:PERMS[:ALIGN], got '{0}'")]
    BadRegion(String),

    #[error("invalid permissions '{0}' (use r, w, rw or -)")]
    BadPermissions(String),

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error("expected PATH@ADDR, got '{0}'")]
    BadImage(String),
}

/// Parse a hex number, with or without a `0x` prefix.
///
/// # Errors
///
/// Empty input, a non-hex digit or overflow.
pub fn parse_hex(arg: &str) -> Result<u64, ConfigError> {
    let digits = arg.trim();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(digits)
        .replace('_', "");
    u64::from_str_radix(&digits, 16).map_err(|_| ConfigError::BadNumber(arg.to_string()))
}

/// Parse a hex size that must fit the host address space.
///
/// # Errors
///
/// As [`parse_hex`], or a value above `usize::MAX`.
pub fn parse_size(arg: &str) -> Result<usize, ConfigError> {
    usize::try_from(parse_hex(arg)?).map_err(|_| ConfigError::BadNumber(arg.to_string()))
}

/// Parse `START..END:PERMS[:ALIGN]`, e.g. `20000000..20010000:rw:4`.
///
/// Addresses are hex, `PERMS` is any combination of `r` and `w` (or `-`),
/// `ALIGN` is 0, 1, 2 or 4 and defaults to 1.
///
/// # Errors
///
/// Malformed syntax, bad numbers or an invalid region.
pub fn parse_region(arg: &str) -> Result<MemoryRegion, ConfigError> {
    let bad = || ConfigError::BadRegion(arg.to_string());

    let mut fields = arg.split(':');
    let range = fields.next().ok_or_else(bad)?;
    let perms = fields.next().ok_or_else(bad)?;
    let alignment = match fields.next() {
        Some(align) => align.trim().parse::<u8>().map_err(|_| bad())?,
        None => 1,
    };
    if fields.next().is_some() {
        return Err(bad());
    }

    let (start, end) = range.split_once("..").ok_or_else(bad)?;
    let start = parse_hex(start)?;
    let end = parse_hex(end)?;
    let permissions = parse_permissions(perms)?;

    Ok(MemoryRegion::try_new(start, end, permissions, alignment)?)
}

fn parse_permissions(arg: &str) -> Result<Permissions, ConfigError> {
    let mut perms = Permissions::NONE;
    for ch in arg.trim().chars() {
        match ch {
            'r' | 'R' => perms |= Permissions::READ,
            'w' | 'W' => perms |= Permissions::WRITE,
            '-' => {}
            _ => return Err(ConfigError::BadPermissions(arg.to_string())),
        }
    }
    if arg.trim().is_empty() {
        return Err(ConfigError::BadPermissions(arg.to_string()));
    }
    Ok(perms)
}

/// A raw binary to preload into target RAM.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageSpec {
    pub path: PathBuf,
    pub addr: u64,
}

impl ImageSpec {
    /// Read the image file.
    ///
    /// # Errors
    ///
    /// The file cannot be read.
    pub fn read(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse `PATH@ADDR`. The last `@` separates the address.
///
/// # Errors
///
/// Missing `@`, empty path or a bad address.
pub fn parse_image(arg: &str) -> Result<ImageSpec, ConfigError> {
    let (path, addr) = arg
        .rsplit_once('@')
        .filter(|(path, _)| !path.is_empty())
        .ok_or_else(|| ConfigError::BadImage(arg.to_string()))?;
    Ok(ImageSpec {
        path: PathBuf::from(path),
        addr: parse_hex(addr)?,
    })
}
