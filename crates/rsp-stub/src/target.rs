//! Architecture seam between the portable stub and the debugged CPU.

use rsp_mem::MemoryBus;
use thiserror::Error;

/// Target-side failure of a register or init request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("register {0} does not exist")]
    InvalidRegister(u32),

    #[error("expected {expected} bytes of register data, got {actual}")]
    BadLength { expected: usize, actual: usize },

    #[error("register buffer too small: {needed} bytes needed")]
    BufferTooSmall { needed: usize },

    #[error("{0}")]
    Other(String),
}

/// Why a breakpoint request failed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointError {
    /// The architecture has no such breakpoint/watchpoint type.
    #[error("breakpoint type not supported")]
    NotSupported,

    /// Supported, but this request could not be honoured.
    #[error("breakpoint request failed")]
    Failed,
}

/// `z`/`Z` type field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BreakpointKind {
    Software,
    Hardware,
    WriteWatch,
    ReadWatch,
    AccessWatch,
}

impl BreakpointKind {
    /// Decode the numeric type used on the wire (0-4).
    #[must_use]
    pub const fn from_wire(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::Software),
            1 => Some(Self::Hardware),
            2 => Some(Self::WriteWatch),
            3 => Some(Self::ReadWatch),
            4 => Some(Self::AccessWatch),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_watchpoint(self) -> bool {
        matches!(self, Self::WriteWatch | Self::ReadWatch | Self::AccessWatch)
    }
}

/// Operations the stub needs from the debugged CPU.
///
/// Register data crosses this seam as raw target-order bytes; the stub does
/// all hex encoding. `continue_execution` and `single_step` only arm the
/// target: execution resumes once the stub loop has returned to its caller.
pub trait TargetDebugOps {
    /// One-time setup, run after the transport is up.
    ///
    /// # Errors
    ///
    /// The target cannot be debugged.
    fn init(&mut self) -> Result<(), TargetError> {
        Ok(())
    }

    /// Arm the target to resume free-running execution.
    fn continue_execution(&mut self);

    /// Arm the target to execute exactly one instruction.
    fn single_step(&mut self);

    /// Serialize the full register file into `dst`, returning the bytes used.
    ///
    /// # Errors
    ///
    /// `dst` is too small.
    fn read_all_registers(&mut self, dst: &mut [u8]) -> Result<usize, TargetError>;

    /// Load the full register file from `src`.
    ///
    /// # Errors
    ///
    /// `src` has the wrong size.
    fn write_all_registers(&mut self, src: &[u8]) -> Result<(), TargetError>;

    /// Serialize register `id` into `dst`, returning the bytes used.
    ///
    /// # Errors
    ///
    /// Unknown register or `dst` too small.
    fn read_register(&mut self, id: u32, dst: &mut [u8]) -> Result<usize, TargetError>;

    /// Set register `id` from `src`.
    ///
    /// # Errors
    ///
    /// Unknown register or wrong value size.
    fn write_register(&mut self, id: u32, src: &[u8]) -> Result<(), TargetError>;

    /// Insert a breakpoint or watchpoint.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::NotSupported`] for types the architecture lacks.
    fn add_breakpoint(
        &mut self,
        kind: BreakpointKind,
        addr: u64,
        size: u64,
    ) -> Result<(), BreakpointError>;

    /// Remove a breakpoint or watchpoint.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::NotSupported`] for types the architecture lacks.
    fn remove_breakpoint(
        &mut self,
        kind: BreakpointKind,
        addr: u64,
        size: u64,
    ) -> Result<(), BreakpointError>;

    /// Signal number describing why the target last stopped.
    fn stop_reason(&self) -> u8;

    /// Bus used for `m`/`M` requests once the memory map has allowed them.
    fn memory_bus(&mut self) -> &mut dyn MemoryBus;
}
