//! Portable GDB remote debug stub.
//!
//! A [`GdbStubSession`] reads requests from a [`rsp_wire::ByteTransport`],
//! answers them through a [`TargetDebugOps`] implementation and the
//! configured memory map, and returns an [`Outcome`] when the host resumes,
//! detaches or kills the target. The caller resumes the target and calls
//! [`GdbStubSession::run`] again on the next stop.
//!
//! ```ignore
//! let mut session = GdbStubSession::start(StubConfig::new(), &mut transport, &mut cpu)?;
//! loop {
//!     match session.run(&mut transport, &mut cpu)? {
//!         Outcome::Resume(_) => cpu.run_until_trap(),
//!         Outcome::Detach | Outcome::Kill => break,
//!     }
//! }
//! ```

mod command;
mod dispatch;
mod error;
pub mod metrics;
mod session;
mod target;

pub use command::{BreakpointSpec, Command, ParseError};
pub use error::{ErrorCode, StubError};
pub use session::{
    DEFAULT_PACKET_SIZE, GdbStubSession, MIN_PACKET_SIZE, Outcome, Resume, StubConfig,
};
pub use target::{BreakpointError, BreakpointKind, TargetDebugOps, TargetError};
