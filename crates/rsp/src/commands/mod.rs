//! Command implementations.

mod check;
mod serve;

use crate::cli::{Cli, Commands};

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    match &cli.command {
        Commands::Serve { .. } => handle_serve(cli),
        Commands::Check { .. } => handle_check(cli),
    }
}

fn handle_serve(cli: &Cli) -> i32 {
    let Commands::Serve {
        listen,
        stdio,
        packet_size,
        map,
        ram_base,
        ram_size,
        image,
        entry,
        max_steps,
    } = &cli.command
    else {
        unreachable!("serve command variant mismatch");
    };

    serve::cmd_serve(&serve::ServeArgs {
        listen: (!*stdio).then_some(listen.as_str()),
        packet_size: *packet_size,
        regions: &map.region,
        ram_base: *ram_base,
        ram_size: *ram_size,
        images: image,
        entry: *entry,
        max_steps: *max_steps,
    })
}

fn handle_check(cli: &Cli) -> i32 {
    let Commands::Check { map, addr, len } = &cli.command else {
        unreachable!("check command variant mismatch");
    };

    check::cmd_check(&map.region, *addr, *len)
}
