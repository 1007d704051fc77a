//! The request/response loop.
//!
//! ```text
//! Receiving --framing or parse error--> Error --E01--> Receiving
//! Receiving --c / s / D / k--> Done (returns to the caller)
//! ```

use std::io::Write as _;

use metrics::counter;
use rsp_mem::{read_memory, write_memory};
use rsp_wire::{
    ByteTransport, CodecError, PacketError, bin_to_hex, hex_digit, hex_to_bin, receive_packet,
    send_packet,
};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::command::{BreakpointSpec, Command};
use crate::error::{ErrorCode, StubError};
use crate::metrics::{
    ERROR_REPLIES, MEMORY_READ_BYTES, MEMORY_WRITTEN_BYTES, PACKET_ERRORS, PACKETS_RECEIVED,
    REPLIES_REJECTED, RESUMES,
};
use crate::session::{GdbStubSession, Outcome, Resume, StubConfig};
use crate::target::{BreakpointError, BreakpointKind, TargetDebugOps, TargetError};

enum State {
    Receiving,
    Error,
    Done(Outcome),
}

/// What to send back for one request.
#[derive(Debug, PartialEq, Eq)]
enum Reply {
    /// `$#00`: command not implemented.
    Empty,
    Ok,
    Error(ErrorCode),
    /// The first `n` bytes of the reply buffer.
    Buffer(usize),
    /// Nothing is sent.
    Silent,
}

impl GdbStubSession {
    /// Serve host requests until one of them hands control back.
    ///
    /// On every entry but the first, the current stop reason is announced
    /// before the first request is read. Protocol errors are answered on
    /// the wire and never end the loop.
    ///
    /// # Errors
    ///
    /// Only transport failures, such as the host disconnecting.
    pub fn run<T, D>(&mut self, transport: &mut T, target: &mut D) -> Result<Outcome, StubError>
    where
        T: ByteTransport + ?Sized,
        D: TargetDebugOps + ?Sized,
    {
        if self.first_entry {
            self.first_entry = false;
        } else {
            let n = stop_packet(target.stop_reason(), &mut self.reply);
            send_reply(transport, &self.reply[..n])?;
        }

        let mut state = State::Receiving;
        loop {
            state = match state {
                State::Receiving => self.serve_one(transport, target)?,
                State::Error => {
                    send_error(transport, ErrorCode::General)?;
                    State::Receiving
                }
                State::Done(outcome) => {
                    if outcome == Outcome::Detach {
                        self.reset();
                    }
                    debug!(?outcome, "leaving debug loop");
                    return Ok(outcome);
                }
            };
        }
    }

    fn serve_one<T, D>(&mut self, transport: &mut T, target: &mut D) -> Result<State, StubError>
    where
        T: ByteTransport + ?Sized,
        D: TargetDebugOps + ?Sized,
    {
        let Self {
            config,
            packet,
            reply,
            scratch,
            ..
        } = self;

        let len = match receive_packet(transport, packet) {
            Ok(len) => len,
            Err(PacketError::Transport(e)) => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "dropped packet");
                counter!(PACKET_ERRORS).increment(1);
                return Ok(State::Error);
            }
        };
        counter!(PACKETS_RECEIVED).increment(1);

        let payload = &packet[..len];
        let command = match Command::parse(payload) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, packet = %String::from_utf8_lossy(payload), "malformed request");
                return Ok(State::Error);
            }
        };
        debug!(?command, "request");

        let (answer, outcome) = execute(command, config, reply, scratch, target);
        match answer {
            Reply::Silent => {}
            Reply::Empty => send_reply(transport, b"")?,
            Reply::Ok => send_reply(transport, b"OK")?,
            Reply::Error(code) => send_error(transport, code)?,
            Reply::Buffer(n) => send_reply(transport, &reply[..n])?,
        }
        Ok(outcome.map_or(State::Receiving, State::Done))
    }
}

fn execute<D: TargetDebugOps + ?Sized>(
    command: Command<'_>,
    config: &StubConfig,
    out: &mut [u8],
    scratch: &mut [u8],
    target: &mut D,
) -> (Reply, Option<Outcome>) {
    let reply = match command {
        Command::ReadMemory { addr: 0, .. } | Command::WriteMemory { addr: 0, .. } => {
            debug!("refusing memory access at address 0");
            Reply::Error(ErrorCode::Memory)
        }
        Command::ReadMemory { addr, len } => {
            match read_memory(&config.memory_map, target.memory_bus(), addr, len, out) {
                Ok(n) => {
                    counter!(MEMORY_READ_BYTES).increment(len as u64);
                    Reply::Buffer(n)
                }
                Err(e) => {
                    debug!(error = %e, addr, len, "memory read failed");
                    Reply::Error(ErrorCode::General)
                }
            }
        }
        Command::WriteMemory { addr, len, data } => {
            match write_memory(&config.memory_map, target.memory_bus(), data, addr, len) {
                Ok(n) => {
                    counter!(MEMORY_WRITTEN_BYTES).increment(n as u64);
                    Reply::Ok
                }
                Err(e) => {
                    debug!(error = %e, addr, len, "memory write failed");
                    Reply::Error(ErrorCode::General)
                }
            }
        }
        Command::Continue { addr } => {
            target.continue_execution();
            counter!(RESUMES, "kind" => "continue").increment(1);
            return (Reply::Silent, Some(Outcome::Resume(Resume::Continue { addr })));
        }
        Command::Step { addr } => {
            target.single_step();
            counter!(RESUMES, "kind" => "step").increment(1);
            return (Reply::Silent, Some(Outcome::Resume(Resume::Step { addr })));
        }
        Command::ReadRegisters => read_registers(target, None, scratch, out),
        Command::WriteRegisters { data } => write_registers(target, None, data, scratch),
        Command::ReadRegister { id } => read_registers(target, Some(id), scratch, out),
        Command::WriteRegister { id, value } => write_registers(target, Some(id), value, scratch),
        Command::InsertBreakpoint(spec) => breakpoint(spec, target, true),
        Command::RemoveBreakpoint(spec) => breakpoint(spec, target, false),
        Command::HaltReason => Reply::Buffer(stop_packet(target.stop_reason(), out)),
        Command::QuerySupported => {
            let capacity = out.len();
            let mut cursor = &mut out[..];
            match write!(cursor, "PacketSize={:x}", config.packet_size) {
                Ok(()) => Reply::Buffer(capacity - cursor.len()),
                Err(_) => Reply::Error(ErrorCode::General),
            }
        }
        Command::Detach => return (Reply::Ok, Some(Outcome::Detach)),
        Command::Kill => return (Reply::Silent, Some(Outcome::Kill)),
        Command::Unknown => Reply::Empty,
    };
    (reply, None)
}

/// Register transfer failure, answered with `E01`.
#[derive(Debug, Error)]
enum RegisterError {
    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// `g` when `id` is `None`, otherwise `p id`.
fn read_registers<D: TargetDebugOps + ?Sized>(
    target: &mut D,
    id: Option<u32>,
    scratch: &mut [u8],
    out: &mut [u8],
) -> Reply {
    match encode_registers(target, id, scratch, out) {
        Ok(n) => Reply::Buffer(n),
        Err(e) => {
            debug!(error = %e, ?id, "register read failed");
            Reply::Error(ErrorCode::General)
        }
    }
}

fn encode_registers<D: TargetDebugOps + ?Sized>(
    target: &mut D,
    id: Option<u32>,
    scratch: &mut [u8],
    out: &mut [u8],
) -> Result<usize, RegisterError> {
    let n = match id {
        None => target.read_all_registers(scratch)?,
        Some(id) => target.read_register(id, scratch)?,
    };
    Ok(bin_to_hex(&scratch[..n], out)?)
}

/// `G hex` when `id` is `None`, otherwise `P id=hex`.
fn write_registers<D: TargetDebugOps + ?Sized>(
    target: &mut D,
    id: Option<u32>,
    hex: &[u8],
    scratch: &mut [u8],
) -> Reply {
    match decode_registers(target, id, hex, scratch) {
        Ok(()) => Reply::Ok,
        Err(e) => {
            debug!(error = %e, ?id, "register write failed");
            Reply::Error(ErrorCode::General)
        }
    }
}

fn decode_registers<D: TargetDebugOps + ?Sized>(
    target: &mut D,
    id: Option<u32>,
    hex: &[u8],
    scratch: &mut [u8],
) -> Result<(), RegisterError> {
    let n = hex_to_bin(hex, scratch)?;
    match id {
        None => target.write_all_registers(&scratch[..n])?,
        Some(id) => target.write_register(id, &scratch[..n])?,
    }
    Ok(())
}

fn breakpoint<D: TargetDebugOps + ?Sized>(
    spec: BreakpointSpec,
    target: &mut D,
    insert: bool,
) -> Reply {
    let Some(kind) = BreakpointKind::from_wire(spec.type_id) else {
        debug!(type_id = spec.type_id, "unknown breakpoint type");
        return Reply::Empty;
    };
    let res = if insert {
        target.add_breakpoint(kind, spec.addr, spec.size)
    } else {
        target.remove_breakpoint(kind, spec.addr, spec.size)
    };
    match res {
        Ok(()) => Reply::Ok,
        Err(BreakpointError::NotSupported) => {
            debug!(?kind, "breakpoint type not supported by target");
            Reply::Empty
        }
        Err(BreakpointError::Failed) => {
            debug!(?kind, addr = spec.addr, insert, "breakpoint request failed");
            Reply::Error(ErrorCode::General)
        }
    }
}

/// `T` followed by the signal number as two hex digits.
fn stop_packet(signal: u8, out: &mut [u8]) -> usize {
    out[..3].copy_from_slice(&[b'T', hex_digit(signal >> 4), hex_digit(signal)]);
    3
}

fn send_error<T: ByteTransport + ?Sized>(
    transport: &mut T,
    code: ErrorCode,
) -> Result<(), StubError> {
    counter!(ERROR_REPLIES, "code" => code.as_str()).increment(1);
    send_reply(transport, code.as_bytes())
}

/// Send one reply. A NAK from the host is logged and otherwise ignored.
fn send_reply<T: ByteTransport + ?Sized>(
    transport: &mut T,
    payload: &[u8],
) -> Result<(), StubError> {
    match send_packet(transport, payload) {
        Ok(()) => {
            trace!(len = payload.len(), "reply acknowledged");
            Ok(())
        }
        Err(PacketError::Transport(e)) => Err(e.into()),
        Err(e) => {
            warn!(error = %e, "reply rejected by host");
            counter!(REPLIES_REJECTED).increment(1);
            Ok(())
        }
    }
}
