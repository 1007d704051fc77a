//! A simulated RV32 target for exercising the debug stub without hardware.

mod ram;
mod target;

pub use ram::{GUARD_SIZE, GuardedRam, RamError};
pub use target::{
    DEFAULT_MAX_STEPS, EBREAK, PC_REGISTER, REGISTER_FILE_BYTES, SIGINT, SIGSEGV, SIGTRAP,
    SimError, SimTarget, StopReason,
};
