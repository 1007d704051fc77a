//! CLI definitions and argument types.

use clap::{Args, Parser, Subcommand};
use rsp::{ImageSpec, parse_hex, parse_image, parse_region, parse_size};
use rsp_mem::MemoryRegion;

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "rsp")]
#[command(about = "GDB remote debug stub for a simulated RV32 target")]
#[command(version)]
pub struct Cli {
    /// Show metrics summary after the session
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Enable verbose output (rsp=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve a debug session for the simulated target
    Serve {
        /// Listen address (e.g., :1234 or 0.0.0.0:1234)
        #[arg(long, default_value = ":1234", conflicts_with = "stdio")]
        listen: String,

        /// Talk to the debugger on stdin/stdout (`target remote | rsp serve --stdio`)
        #[arg(long)]
        stdio: bool,

        /// Packet payload capacity in bytes; the RV32 register file needs 264
        #[arg(long, default_value = "1024")]
        packet_size: usize,

        #[command(flatten)]
        map: MapArgs,

        /// RAM base address (hex)
        #[arg(long, default_value = "80000000", value_parser = parse_hex)]
        ram_base: u64,

        /// RAM size in bytes (hex)
        #[arg(long, default_value = "100000", value_parser = parse_size)]
        ram_size: usize,

        /// Raw binary to preload, as PATH@ADDR (repeatable)
        #[arg(long, value_name = "PATH@ADDR", value_parser = parse_image)]
        image: Vec<ImageSpec>,

        /// Initial pc (hex, default: RAM base)
        #[arg(long, value_parser = parse_hex)]
        entry: Option<u64>,

        /// Maximum instructions one continue may retire
        #[arg(long, default_value = "1000000")]
        max_steps: u64,
    },
    /// Show how the memory map treats an access
    Check {
        #[command(flatten)]
        map: MapArgs,

        /// Start address (hex)
        #[arg(value_parser = parse_hex)]
        addr: u64,

        /// Length in bytes (hex)
        #[arg(value_parser = parse_size)]
        len: usize,
    },
}

/// Memory map shared by the subcommands.
#[derive(Args)]
pub struct MapArgs {
    /// Accessible region as START..END:PERMS[:ALIGN] (hex, repeatable).
    /// Without any region all memory is accessible byte-wise.
    #[arg(long, value_name = "REGION", value_parser = parse_region)]
    pub region: Vec<MemoryRegion>,
}
