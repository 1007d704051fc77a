//! RSP CLI - GDB remote debug stub

mod cli;
mod commands;
mod terminal;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use cli::Cli;

fn main() {
    let cli = Cli::parse();

    let metrics_handle = if cli.metrics {
        rsp::metrics::SummaryRecorder::new().install()
    } else {
        None
    };
    rsp::metrics::init();

    let default_level = if cli.silent {
        "rsp=error"
    } else if cli.verbose {
        "rsp=debug"
    } else {
        "rsp=info"
    };
    // Logs go to stderr: stdout may be the debugger link.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(default_level.parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let exit_code = commands::run_command(&cli);

    if let Some(handle) = metrics_handle {
        handle.print_summary();
    }

    std::process::exit(exit_code);
}
