//! GDB remote debug stub server.
//!
//! Runs the portable stub against a simulated RV32 target over TCP or
//! stdio, so a stock `gdb` can load memory, set breakpoints and step.
//!
//! ```ignore
//! let mut target = SimTarget::new(GuardedRam::new(0x8000_0000, 1 << 20)?)?;
//! let listener = rsp::transport::bind(":1234")?;
//! let (mut link, _peer) = rsp::transport::accept(&listener)?;
//! let summary = rsp::serve(StubConfig::new(), &mut link, &mut target)?;
//! ```

pub mod config;
pub mod metrics;
mod server;
pub mod transport;

pub use config::{ConfigError, ImageSpec, parse_hex, parse_image, parse_region, parse_size};
pub use server::{ServeError, ServeSummary, SessionEnd, serve};
