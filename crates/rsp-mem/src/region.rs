//! Memory region access policy.

use thiserror::Error;

/// Region configuration errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegionError {
    #[error("alignment {0} is not one of 0, 1, 2, 4")]
    BadAlignment(u8),

    #[error("region start {start:#x} is above its end {end:#x}")]
    Inverted { start: u64, end: u64 },
}

/// Access permissions of a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Permissions(u8);

impl Permissions {
    pub const NONE: Self = Self(0);
    pub const READ: Self = Self(1 << 0);
    pub const WRITE: Self = Self(1 << 1);
    pub const READ_WRITE: Self = Self(Self::READ.0 | Self::WRITE.0);

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl core::ops::BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for Permissions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl core::fmt::Display for Permissions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let r = if self.contains(Self::READ) { "r" } else { "-" };
        let w = if self.contains(Self::WRITE) { "w" } else { "-" };
        write!(f, "{r}{w}")
    }
}

/// An address range with access permissions and a required bus granularity.
///
/// Alignment 0 means "no constraint" and behaves like 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: u64,
    pub end: u64,
    pub permissions: Permissions,
    pub alignment: u8,
}

const fn alignment_is_valid(alignment: u8) -> bool {
    matches!(alignment, 0 | 1 | 2 | 4)
}

impl MemoryRegion {
    /// Create a region, panicking on a bad configuration.
    ///
    /// Intended for `const`/`static` board tables, where the panic becomes a
    /// build failure.
    ///
    /// # Panics
    ///
    /// `alignment` is not 0, 1, 2 or 4, or `start > end`.
    #[must_use]
    pub const fn new(start: u64, end: u64, permissions: Permissions, alignment: u8) -> Self {
        assert!(
            alignment_is_valid(alignment),
            "region alignment must be 0, 1, 2 or 4"
        );
        assert!(start <= end, "region start must not exceed its end");
        Self {
            start,
            end,
            permissions,
            alignment,
        }
    }

    /// Create a region from runtime configuration.
    ///
    /// # Errors
    ///
    /// Rejects alignments other than 0, 1, 2, 4 and inverted ranges.
    pub const fn try_new(
        start: u64,
        end: u64,
        permissions: Permissions,
        alignment: u8,
    ) -> Result<Self, RegionError> {
        if !alignment_is_valid(alignment) {
            return Err(RegionError::BadAlignment(alignment));
        }
        if start > end {
            return Err(RegionError::Inverted { start, end });
        }
        Ok(Self {
            start,
            end,
            permissions,
            alignment,
        })
    }

    /// Effective access granularity (0 is reported as 1).
    #[must_use]
    pub const fn effective_alignment(&self) -> usize {
        if self.alignment == 0 {
            1
        } else {
            self.alignment as usize
        }
    }

    /// Whether `[addr, addr + len)` lies in this region.
    ///
    /// The end bound is strict: an access finishing exactly at `end` is
    /// rejected.
    const fn covers(&self, addr: u64, len: u64) -> bool {
        let Some(last) = addr.checked_add(len) else {
            return false;
        };
        addr >= self.start && addr < self.end && last >= self.start && last < self.end
    }
}

/// Ordered table of regions.
///
/// An empty map permits every access with alignment 1.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryMap {
    regions: Vec<MemoryRegion>,
}

impl MemoryMap {
    /// Map with no regions: all memory accessible byte-wise.
    #[must_use]
    pub const fn unrestricted() -> Self {
        Self {
            regions: Vec::new(),
        }
    }

    #[must_use]
    pub fn new(regions: impl Into<Vec<MemoryRegion>>) -> Self {
        Self {
            regions: regions.into(),
        }
    }

    #[must_use]
    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.regions.is_empty()
    }

    /// Alignment to use for reading `[addr, addr + len)`, or `None` if denied.
    #[must_use]
    pub fn can_read(&self, addr: u64, len: usize) -> Option<usize> {
        self.lookup(addr, len, Permissions::READ)
    }

    /// Alignment to use for writing `[addr, addr + len)`, or `None` if denied.
    #[must_use]
    pub fn can_write(&self, addr: u64, len: usize) -> Option<usize> {
        self.lookup(addr, len, Permissions::WRITE)
    }

    fn lookup(&self, addr: u64, len: usize, needed: Permissions) -> Option<usize> {
        if self.regions.is_empty() {
            return Some(1);
        }
        let len = u64::try_from(len).ok()?;
        self.regions
            .iter()
            .find(|r| r.permissions.contains(needed) && r.covers(addr, len))
            .map(MemoryRegion::effective_alignment)
    }
}

impl From<Vec<MemoryRegion>> for MemoryMap {
    fn from(regions: Vec<MemoryRegion>) -> Self {
        Self { regions }
    }
}

impl From<&[MemoryRegion]> for MemoryMap {
    fn from(regions: &[MemoryRegion]) -> Self {
        Self::new(regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOARD: [MemoryRegion; 3] = [
        MemoryRegion::new(0x1000, 0x2000, Permissions::READ_WRITE, 0),
        MemoryRegion::new(0x4000_0000, 0x4000_1000, Permissions::READ_WRITE, 4),
        MemoryRegion::new(0x8000, 0x9000, Permissions::READ, 2),
    ];

    #[test]
    fn test_unrestricted_map_allows_everything() {
        let map = MemoryMap::unrestricted();
        assert_eq!(map.can_read(0, 4), Some(1));
        assert_eq!(map.can_write(u64::MAX - 8, 4), Some(1));
    }

    #[test]
    fn test_alignment_zero_reported_as_one() {
        let map = MemoryMap::from(&BOARD[..]);
        assert_eq!(map.can_read(0x1000, 4), Some(1));
        assert_eq!(map.can_write(0x4000_0002, 4), Some(4));
    }

    #[test]
    fn test_permissions_gate_access() {
        let map = MemoryMap::from(&BOARD[..]);
        assert_eq!(map.can_read(0x8000, 8), Some(2));
        assert_eq!(map.can_write(0x8000, 8), None);
    }

    #[test]
    fn test_uncovered_address_denied() {
        let map = MemoryMap::from(&BOARD[..]);
        assert_eq!(map.can_read(0x3000, 1), None);
        assert_eq!(map.can_write(0, 4), None);
    }

    #[test]
    fn test_range_straddling_region_end_denied() {
        let map = MemoryMap::from(&BOARD[..]);
        assert_eq!(map.can_read(0x1ffe, 4), None);
    }

    #[test]
    fn test_access_ending_exactly_at_region_end_denied() {
        let map = MemoryMap::from(&BOARD[..]);
        assert_eq!(map.can_read(0x1ffc, 3), Some(1));
        assert_eq!(map.can_read(0x1ffc, 4), None);
    }

    #[test]
    fn test_wrapping_range_denied() {
        let map = MemoryMap::new(vec![MemoryRegion::new(
            0,
            u64::MAX,
            Permissions::READ,
            1,
        )]);
        assert_eq!(map.can_read(u64::MAX - 1, 4), None);
    }

    #[test]
    fn test_first_matching_region_wins() {
        let map = MemoryMap::new(vec![
            MemoryRegion::new(0x0, 0x100, Permissions::READ, 4),
            MemoryRegion::new(0x0, 0x100, Permissions::READ_WRITE, 2),
        ]);
        assert_eq!(map.can_read(0x10, 4), Some(4));
        assert_eq!(map.can_write(0x10, 4), Some(2));
    }

    #[test]
    fn test_try_new_rejects_bad_config() {
        assert_eq!(
            MemoryRegion::try_new(0, 0x10, Permissions::READ, 8),
            Err(RegionError::BadAlignment(8))
        );
        assert_eq!(
            MemoryRegion::try_new(0, 0x10, Permissions::READ, 3),
            Err(RegionError::BadAlignment(3))
        );
        assert_eq!(
            MemoryRegion::try_new(0x20, 0x10, Permissions::READ, 1),
            Err(RegionError::Inverted {
                start: 0x20,
                end: 0x10
            })
        );
    }

    #[test]
    #[should_panic(expected = "region alignment")]
    fn test_new_asserts_alignment() {
        let _ = MemoryRegion::new(0, 0x10, Permissions::READ, 8);
    }

    #[test]
    fn test_permissions_display() {
        assert_eq!(Permissions::READ_WRITE.to_string(), "rw");
        assert_eq!(Permissions::READ.to_string(), "r-");
        assert_eq!((Permissions::NONE | Permissions::WRITE).to_string(), "-w");
    }
}
