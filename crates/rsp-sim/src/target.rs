//! Simulated RV32 core exposed to the stub.
//!
//! The core decodes just enough to be debugged: `ebreak` traps, every other
//! word is treated as a 4-byte no-op. Registers use the standard RV32 GDB
//! layout (x0-x31, then pc) so a stock `gdb` can attach.

use gdbstub::arch::Registers;
use gdbstub_arch::riscv::reg::RiscvCoreRegs;
use rsp_mem::MemoryBus;
use rsp_stub::{BreakpointError, BreakpointKind, TargetDebugOps, TargetError};
use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::{debug, trace};

use crate::ram::{GuardedRam, RamError};

/// `ebreak` encoding.
pub const EBREAK: u32 = 0x0010_0073;

/// GDB register number of the program counter.
pub const PC_REGISTER: u32 = 32;

/// Size of the `g` register blob: 32 GPRs and pc, 4 bytes each.
pub const REGISTER_FILE_BYTES: usize = 33 * 4;

/// Instructions one `continue` may retire before it is interrupted.
pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;

pub const SIGINT: u8 = 2;
pub const SIGTRAP: u8 = 5;
pub const SIGSEGV: u8 = 11;

/// Simulated target errors.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Ram(#[from] RamError),

    #[error("entry point {0:#x} does not fit in 32 bits")]
    EntryOutOfRange(u64),
}

/// Execution mode armed by the last resume request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExecMode {
    Continue,
    Step,
}

/// Why the core last stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Not yet run.
    Halted,
    /// Hit `ebreak` or a breakpoint address.
    Breakpoint,
    /// Finished a single step.
    DoneStep,
    /// Instruction fetch outside RAM.
    FetchFault { pc: u32 },
    /// `continue` ran out of steps.
    Interrupted,
}

impl StopReason {
    /// Signal number reported to the host.
    #[must_use]
    pub const fn signal(self) -> u8 {
        match self {
            Self::Halted | Self::Breakpoint | Self::DoneStep => SIGTRAP,
            Self::FetchFault { .. } => SIGSEGV,
            Self::Interrupted => SIGINT,
        }
    }
}

/// A single-hart RV32 core with guard-paged RAM.
pub struct SimTarget {
    ram: GuardedRam,
    regs: RiscvCoreRegs<u32>,
    breakpoints: FxHashSet<u64>,
    exec_mode: ExecMode,
    stop: StopReason,
    max_steps: u64,
    retired: u64,
}

impl SimTarget {
    /// Create a halted core with pc at the start of RAM.
    ///
    /// # Errors
    ///
    /// RAM base above the 32-bit address space.
    pub fn new(ram: GuardedRam) -> Result<Self, SimError> {
        let base = ram.base();
        let mut target = Self {
            ram,
            regs: RiscvCoreRegs::default(),
            breakpoints: FxHashSet::default(),
            exec_mode: ExecMode::Continue,
            stop: StopReason::Halted,
            max_steps: DEFAULT_MAX_STEPS,
            retired: 0,
        };
        target.set_pc(base)?;
        Ok(target)
    }

    /// Bound the number of instructions one `continue` may retire.
    #[must_use]
    pub const fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set the program counter.
    ///
    /// # Errors
    ///
    /// `pc` does not fit in 32 bits.
    pub fn set_pc(&mut self, pc: u64) -> Result<(), SimError> {
        let Ok(narrow) = u32::try_from(pc) else {
            return Err(SimError::EntryOutOfRange(pc));
        };
        self.regs.pc = narrow;
        Ok(())
    }

    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.regs.pc
    }

    /// General register `x<n>`; `None` past x31.
    #[must_use]
    pub fn gpr(&self, n: usize) -> Option<u32> {
        self.regs.x.get(n).copied()
    }

    /// Copy a raw image into RAM.
    ///
    /// # Errors
    ///
    /// The image does not fit in RAM at `addr`.
    pub fn load_image(&mut self, addr: u64, image: &[u8]) -> Result<(), SimError> {
        self.ram.load(addr, image)?;
        debug!(addr, len = image.len(), "loaded image");
        Ok(())
    }

    #[must_use]
    pub const fn last_stop(&self) -> StopReason {
        self.stop
    }

    /// Instructions retired since creation.
    #[must_use]
    pub const fn retired(&self) -> u64 {
        self.retired
    }

    /// Run in the mode armed by the last `continue_execution` or
    /// `single_step` until the core stops.
    pub fn resume(&mut self) -> StopReason {
        let stop = match self.exec_mode {
            ExecMode::Step => self.execute_one().unwrap_or(StopReason::DoneStep),
            ExecMode::Continue => self.run_until_stop(),
        };
        debug!(?stop, pc = self.regs.pc, retired = self.retired, "core stopped");
        self.stop = stop;
        stop
    }

    fn run_until_stop(&mut self) -> StopReason {
        for _ in 0..self.max_steps {
            if let Some(stop) = self.execute_one() {
                return stop;
            }
            if self.breakpoints.contains(&u64::from(self.regs.pc)) {
                return StopReason::Breakpoint;
            }
        }
        StopReason::Interrupted
    }

    /// Fetch and retire one instruction, or report why it cannot.
    fn execute_one(&mut self) -> Option<StopReason> {
        let pc = self.regs.pc;
        let word = match self.ram.read_u32(u64::from(pc)) {
            Ok(raw) => u32::from_le_bytes(raw.to_ne_bytes()),
            Err(fault) => {
                trace!(%fault, "instruction fetch fault");
                return Some(StopReason::FetchFault { pc });
            }
        };
        if word == EBREAK {
            return Some(StopReason::Breakpoint);
        }
        self.regs.pc = pc.wrapping_add(4);
        self.retired += 1;
        None
    }
}

impl TargetDebugOps for SimTarget {
    fn continue_execution(&mut self) {
        self.exec_mode = ExecMode::Continue;
    }

    fn single_step(&mut self) {
        self.exec_mode = ExecMode::Step;
    }

    fn read_all_registers(&mut self, dst: &mut [u8]) -> Result<usize, TargetError> {
        if dst.len() < REGISTER_FILE_BYTES {
            return Err(TargetError::BufferTooSmall {
                needed: REGISTER_FILE_BYTES,
            });
        }
        let mut n = 0;
        self.regs.gdb_serialize(|byte| {
            dst[n] = byte.unwrap_or(0);
            n += 1;
        });
        Ok(n)
    }

    fn write_all_registers(&mut self, src: &[u8]) -> Result<(), TargetError> {
        let bad_length = TargetError::BadLength {
            expected: REGISTER_FILE_BYTES,
            actual: src.len(),
        };
        if src.len() != REGISTER_FILE_BYTES {
            return Err(bad_length);
        }
        let mut regs = RiscvCoreRegs::default();
        regs.gdb_deserialize(src).map_err(|()| bad_length)?;
        regs.x[0] = 0;
        self.regs = regs;
        Ok(())
    }

    fn read_register(&mut self, id: u32, dst: &mut [u8]) -> Result<usize, TargetError> {
        let value = match id {
            PC_REGISTER => Some(self.regs.pc),
            n => self.gpr(n as usize),
        };
        let value = value.ok_or(TargetError::InvalidRegister(id))?;
        let too_small = TargetError::BufferTooSmall { needed: 4 };
        let out = dst.get_mut(..4).ok_or(too_small)?;
        out.copy_from_slice(&value.to_le_bytes());
        Ok(4)
    }

    fn write_register(&mut self, id: u32, src: &[u8]) -> Result<(), TargetError> {
        let bad_length = TargetError::BadLength {
            expected: 4,
            actual: src.len(),
        };
        let raw: [u8; 4] = src.try_into().map_err(|_| bad_length)?;
        let value = u32::from_le_bytes(raw);
        match id {
            PC_REGISTER => self.regs.pc = value,
            // x0 is hardwired to zero.
            0 => {}
            n => {
                let slot = self.regs.x.get_mut(n as usize);
                let reg = slot.ok_or(TargetError::InvalidRegister(id))?;
                *reg = value;
            }
        }
        Ok(())
    }

    fn add_breakpoint(
        &mut self,
        kind: BreakpointKind,
        addr: u64,
        _size: u64,
    ) -> Result<(), BreakpointError> {
        if kind.is_watchpoint() {
            return Err(BreakpointError::NotSupported);
        }
        self.breakpoints.insert(addr);
        Ok(())
    }

    fn remove_breakpoint(
        &mut self,
        kind: BreakpointKind,
        addr: u64,
        _size: u64,
    ) -> Result<(), BreakpointError> {
        if kind.is_watchpoint() {
            return Err(BreakpointError::NotSupported);
        }
        if self.breakpoints.remove(&addr) {
            Ok(())
        } else {
            Err(BreakpointError::Failed)
        }
    }

    fn stop_reason(&self) -> u8 {
        self.stop.signal()
    }

    fn memory_bus(&mut self) -> &mut dyn MemoryBus {
        &mut self.ram
    }
}
