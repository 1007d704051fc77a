//! Check command.

use rsp_mem::{MemoryMap, MemoryRegion};

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal;

/// Handle the `check` command.
///
/// Prints the map and the verdict for reading and writing `[addr, addr + len)`.
/// Fails only if both are denied.
pub fn cmd_check(regions: &[MemoryRegion], addr: u64, len: usize) -> i32 {
    let map = MemoryMap::new(regions);

    if map.is_unrestricted() {
        terminal::info("No regions: all memory is accessible byte-wise");
    } else {
        terminal::info("Memory map:");
        for r in map.regions() {
            terminal::dim(&format!(
                "{:#010x}..{:#010x} {} align {}",
                r.start,
                r.end,
                r.permissions,
                r.effective_alignment()
            ));
        }
    }

    let read = map.can_read(addr, len);
    let write = map.can_write(addr, len);
    println!("read  {addr:#x}+{len:#x}: {}", verdict(read));
    println!("write {addr:#x}+{len:#x}: {}", verdict(write));

    if read.is_none() && write.is_none() {
        EXIT_FAILURE
    } else {
        EXIT_SUCCESS
    }
}

fn verdict(alignment: Option<usize>) -> String {
    alignment.map_or_else(
        || "denied".to_string(),
        |align| format!("allowed, {align}-byte accesses"),
    )
}
