//! Debug session driver for the simulated target.
//!
//! Alternates between the stub's request loop and target execution until
//! the host detaches, kills the target or goes away.

use std::fmt;
use std::io;

use metrics::{counter, gauge, histogram};
use rsp_sim::{SimError, SimTarget, StopReason};
use rsp_stub::{GdbStubSession, Outcome, Resume, StubConfig, StubError, TargetDebugOps};
use rsp_wire::ByteTransport;
use thiserror::Error;
use tracing::{debug, info};

use crate::metrics::{DEBUG_ENTRIES, RESUME_INSTRUCTIONS, RETIRED_INSTRUCTIONS};

/// Server errors.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("debug session failed: {0}")]
    Stub(#[from] StubError),

    #[error("target error: {0}")]
    Sim(#[from] SimError),
}

/// How a session finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    Detached,
    Killed,
    Disconnected,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Detached => "host detached",
            Self::Killed => "host killed the target",
            Self::Disconnected => "host disconnected",
        })
    }
}

/// What happened during a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServeSummary {
    pub end: SessionEnd,
    /// Times the debug loop was entered.
    pub entries: u64,
    pub retired: u64,
    pub last_stop: StopReason,
}

/// Serve one debugger session on `transport`.
///
/// A requested resume address is applied to the pc before the target runs.
/// After a detach the target runs once more, unobserved, up to its step
/// bound.
///
/// # Errors
///
/// Transport failures other than the host going away, or a bad resume
/// address.
pub fn serve<T: ByteTransport + ?Sized>(
    config: StubConfig,
    transport: &mut T,
    target: &mut SimTarget,
) -> Result<ServeSummary, ServeError> {
    let mut session = GdbStubSession::start(config, transport, target)?;
    let mut entries = 0u64;

    let end = loop {
        entries += 1;
        counter!(DEBUG_ENTRIES).increment(1);

        let outcome = match session.run(transport, target) {
            Ok(outcome) => outcome,
            Err(StubError::Transport(e)) if is_disconnect(&e) => {
                debug!(error = %e, "transport closed");
                break SessionEnd::Disconnected;
            }
            Err(e) => return Err(e.into()),
        };

        match outcome {
            Outcome::Resume(resume) => {
                let (Resume::Continue { addr } | Resume::Step { addr }) = resume;
                if let Some(addr) = addr {
                    target.set_pc(addr)?;
                }
                run_target(target);
            }
            Outcome::Detach => {
                target.continue_execution();
                run_target(target);
                break SessionEnd::Detached;
            }
            Outcome::Kill => break SessionEnd::Killed,
        }
    };

    let retired = target.retired();
    #[allow(clippy::cast_precision_loss)]
    let retired_f = retired as f64;
    gauge!(RETIRED_INSTRUCTIONS).set(retired_f);
    info!(%end, entries, retired, "session finished");

    Ok(ServeSummary {
        end,
        entries,
        retired,
        last_stop: target.last_stop(),
    })
}

fn run_target(target: &mut SimTarget) {
    let before = target.retired();
    target.resume();
    #[allow(clippy::cast_precision_loss)]
    let retired = (target.retired() - before) as f64;
    histogram!(RESUME_INSTRUCTIONS).record(retired);
}

fn is_disconnect(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}
