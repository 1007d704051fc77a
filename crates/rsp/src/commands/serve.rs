//! Serve command.

use rsp::{ImageSpec, ServeError, ServeSummary, serve, transport};
use rsp_mem::MemoryRegion;
use rsp_sim::{GuardedRam, SimError, SimTarget};
use rsp_stub::StubConfig;
use tracing::{error, info};

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal::{self, Spinner};

pub struct ServeArgs<'a> {
    /// `None` selects stdio.
    pub listen: Option<&'a str>,
    pub packet_size: usize,
    pub regions: &'a [MemoryRegion],
    pub ram_base: u64,
    pub ram_size: usize,
    pub images: &'a [ImageSpec],
    pub entry: Option<u64>,
    pub max_steps: u64,
}

/// Handle the `serve` command.
pub fn cmd_serve(args: &ServeArgs<'_>) -> i32 {
    let mut target = match build_target(args) {
        Ok(target) => target,
        Err(e) => {
            error!(error = %e, "failed to set up target");
            return EXIT_FAILURE;
        }
    };

    let config = StubConfig::new().with_packet_size(args.packet_size);
    let config = config.with_memory_map(args.regions.to_vec());

    match serve_link(args.listen, config, &mut target) {
        Ok(summary) => {
            report(&summary);
            EXIT_SUCCESS
        }
        Err(e) => {
            error!(error = %e, "debug session failed");
            EXIT_FAILURE
        }
    }
}

fn build_target(args: &ServeArgs<'_>) -> Result<SimTarget, ServeError> {
    let ram = GuardedRam::new(args.ram_base, args.ram_size).map_err(SimError::from)?;
    let mut target = SimTarget::new(ram)?.with_max_steps(args.max_steps);

    for image in args.images {
        let path = image.path().display();
        let read = image.read();
        let bytes = read.inspect_err(|_| error!(%path, "failed to read image"))?;
        target.load_image(image.addr, &bytes)?;
        info!(%path, addr = image.addr, len = bytes.len(), "loaded image");
    }
    if let Some(entry) = args.entry {
        target.set_pc(entry)?;
    }
    Ok(target)
}

fn serve_link(
    listen: Option<&str>,
    config: StubConfig,
    target: &mut SimTarget,
) -> Result<ServeSummary, ServeError> {
    if let Some(addr) = listen {
        return serve_tcp(addr, config, target);
    }
    info!("serving on stdio");
    serve(config, &mut transport::stdio(), target)
}

fn serve_tcp(
    addr: &str,
    config: StubConfig,
    target: &mut SimTarget,
) -> Result<ServeSummary, ServeError> {
    let listener = transport::bind(addr)?;
    let spinner = Spinner::new(format!(
        "Waiting for GDB connection on {}...",
        transport::normalize_listen_addr(addr)
    ));
    let (mut link, peer) = match transport::accept(&listener) {
        Ok(accepted) => accepted,
        Err(e) => {
            spinner.finish_with_failure("accept failed");
            return Err(e.into());
        }
    };
    spinner.finish_with_success(&format!("GDB connected from {peer}"));
    serve(config, &mut link, target)
}

fn report(summary: &ServeSummary) {
    terminal::success(&format!("Session ended: {}", summary.end));
    terminal::dim(&format!(
        "{} debug entries, {} instructions retired, last stop {:?}",
        summary.entries, summary.retired, summary.last_stop
    ));
}
