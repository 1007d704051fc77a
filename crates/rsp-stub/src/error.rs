//! Error replies and session errors.

use std::io;

use thiserror::Error;

use crate::target::TargetError;

/// Error packets sent to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// `E01`: malformed request, failed access or target error.
    General,
    /// `E14`: memory request refused by the null-address guard.
    Memory,
    /// `E22`: oversized request. Reserved; overflow currently replies `E01`.
    Overflow,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "E01",
            Self::Memory => "E14",
            Self::Overflow => "E22",
        }
    }

    #[must_use]
    pub const fn as_bytes(self) -> &'static [u8] {
        self.as_str().as_bytes()
    }
}

impl core::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conditions that end a debug session.
///
/// Everything else is answered on the wire and the session carries on.
#[derive(Debug, Error)]
pub enum StubError {
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("target initialization failed: {0}")]
    Target(#[from] TargetError),
}
