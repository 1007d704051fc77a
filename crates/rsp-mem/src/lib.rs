//! Target memory access for the debug stub.
//!
//! A [`MemoryMap`] of [`MemoryRegion`]s decides whether a range may be read
//! or written and at which bus granularity; [`read_memory`] and
//! [`write_memory`] consult it for every request and then move data through
//! a [`MemoryBus`], using whole aligned units where the region demands it.

mod access;
mod bus;
mod region;

pub use access::{AccessError, read_memory, write_memory};
pub use bus::{BusFault, MemoryBus, RawBus};
pub use region::{MemoryMap, MemoryRegion, Permissions, RegionError};
