//! End-to-end request/response scenarios over an in-memory transport.

use std::io::Cursor;

use rsp_mem::{BusFault, MemoryBus, MemoryRegion, Permissions};
use rsp_stub::{
    BreakpointError, BreakpointKind, GdbStubSession, MIN_PACKET_SIZE, Outcome, Resume, StubConfig,
    StubError, TargetDebugOps, TargetError,
};
use rsp_wire::{StreamTransport, checksum};

const BASE: u64 = 0x1000;
const SIGTRAP: u8 = 5;

struct VecBus {
    bytes: Vec<u8>,
    accesses: usize,
}

impl VecBus {
    fn slot(&mut self, addr: u64, width: u8) -> Result<usize, BusFault> {
        self.accesses += 1;
        addr.checked_sub(BASE)
            .and_then(|o| usize::try_from(o).ok())
            .filter(|&o| o + usize::from(width) <= self.bytes.len())
            .ok_or(BusFault { addr, width })
    }
}

impl MemoryBus for VecBus {
    fn read_u8(&mut self, addr: u64) -> Result<u8, BusFault> {
        let o = self.slot(addr, 1)?;
        Ok(self.bytes[o])
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> Result<(), BusFault> {
        let o = self.slot(addr, 1)?;
        self.bytes[o] = value;
        Ok(())
    }

    fn read_u16(&mut self, addr: u64) -> Result<u16, BusFault> {
        let o = self.slot(addr, 2)?;
        Ok(u16::from_ne_bytes([self.bytes[o], self.bytes[o + 1]]))
    }

    fn write_u16(&mut self, addr: u64, value: u16) -> Result<(), BusFault> {
        let o = self.slot(addr, 2)?;
        self.bytes[o..o + 2].copy_from_slice(&value.to_ne_bytes());
        Ok(())
    }

    fn read_u32(&mut self, addr: u64) -> Result<u32, BusFault> {
        let o = self.slot(addr, 4)?;
        Ok(u32::from_ne_bytes(self.bytes[o..o + 4].try_into().unwrap()))
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> Result<(), BusFault> {
        let o = self.slot(addr, 4)?;
        self.bytes[o..o + 4].copy_from_slice(&value.to_ne_bytes());
        Ok(())
    }
}

/// Two 32-bit little-endian registers and 16 bytes of RAM at `BASE`.
struct MockTarget {
    bus: VecBus,
    regs: [u32; 2],
    resumed: Vec<&'static str>,
    breakpoints: Vec<(BreakpointKind, u64)>,
    initialized: bool,
    fail_init: bool,
}

impl MockTarget {
    fn new() -> Self {
        Self {
            bus: VecBus {
                bytes: [1, 2, 3, 4].into_iter().chain([0; 12]).collect(),
                accesses: 0,
            },
            regs: [0x1122_3344, 0xaabb_ccdd],
            resumed: Vec::new(),
            breakpoints: Vec::new(),
            initialized: false,
            fail_init: false,
        }
    }

    fn reg(&self, id: u32) -> Result<usize, TargetError> {
        let idx = id as usize;
        if idx < self.regs.len() {
            Ok(idx)
        } else {
            Err(TargetError::InvalidRegister(id))
        }
    }
}

impl TargetDebugOps for MockTarget {
    fn init(&mut self) -> Result<(), TargetError> {
        if self.fail_init {
            return Err(TargetError::Other("no debug unit".into()));
        }
        self.initialized = true;
        Ok(())
    }

    fn continue_execution(&mut self) {
        self.resumed.push("continue");
    }

    fn single_step(&mut self) {
        self.resumed.push("step");
    }

    fn read_all_registers(&mut self, dst: &mut [u8]) -> Result<usize, TargetError> {
        if dst.len() < 8 {
            return Err(TargetError::BufferTooSmall { needed: 8 });
        }
        dst[..4].copy_from_slice(&self.regs[0].to_le_bytes());
        dst[4..8].copy_from_slice(&self.regs[1].to_le_bytes());
        Ok(8)
    }

    fn write_all_registers(&mut self, src: &[u8]) -> Result<(), TargetError> {
        if src.len() != 8 {
            return Err(TargetError::BadLength {
                expected: 8,
                actual: src.len(),
            });
        }
        self.regs[0] = u32::from_le_bytes(src[..4].try_into().unwrap());
        self.regs[1] = u32::from_le_bytes(src[4..].try_into().unwrap());
        Ok(())
    }

    fn read_register(&mut self, id: u32, dst: &mut [u8]) -> Result<usize, TargetError> {
        let idx = self.reg(id)?;
        dst[..4].copy_from_slice(&self.regs[idx].to_le_bytes());
        Ok(4)
    }

    fn write_register(&mut self, id: u32, src: &[u8]) -> Result<(), TargetError> {
        let idx = self.reg(id)?;
        let raw: [u8; 4] = src.try_into().map_err(|_| TargetError::BadLength {
            expected: 4,
            actual: src.len(),
        })?;
        self.regs[idx] = u32::from_le_bytes(raw);
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
        if addr == 0xdead {
            return Err(BreakpointError::Failed);
        }
        self.breakpoints.push((kind, addr));
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
        let pos = self
            .breakpoints
            .iter()
            .position(|&bp| bp == (kind, addr))
            .ok_or(BreakpointError::Failed)?;
        self.breakpoints.remove(pos);
        Ok(())
    }

    fn stop_reason(&self) -> u8 {
        SIGTRAP
    }

    fn memory_bus(&mut self) -> &mut dyn MemoryBus {
        &mut self.bus
    }
}

/// `payload` framed as a packet.
fn packet(payload: &str) -> String {
    format!("${payload}#{:02x}", checksum(payload.as_bytes()))
}

/// A host request followed by the ACK for the stub's reply.
fn request(payload: &str) -> String {
    packet(payload) + "+"
}

/// ACK of the request followed by the stub's reply.
fn reply(payload: &str) -> String {
    format!("+{}", packet(payload))
}

fn run_with(
    session: &mut GdbStubSession,
    target: &mut MockTarget,
    host: &str,
) -> (Result<Outcome, StubError>, String) {
    let input = Cursor::new(host.as_bytes().to_vec());
    let mut transport = StreamTransport::new(input, Vec::new());
    let res = session.run(&mut transport, target);
    let (_, written) = transport.into_parts();
    (res, String::from_utf8(written).unwrap())
}

/// Run a fresh session over `host`; every script ends with `k`.
fn run(host: &str) -> (Outcome, String, MockTarget) {
    let mut target = MockTarget::new();
    let mut session = GdbStubSession::new(StubConfig::new());
    let (res, out) = run_with(&mut session, &mut target, host);
    (res.unwrap(), out, target)
}

const KILL: &str = "$k#6b";

#[test]
fn test_read_memory_scenario() {
    let (outcome, out, _) = run(&format!("$m1000,4#8e+{KILL}"));
    assert_eq!(outcome, Outcome::Kill);
    assert_eq!(out, "+$01020304#8a+");
}

#[test]
fn test_bad_checksum_is_nacked_and_not_dispatched() {
    let (_, out, target) = run(&format!("$m1000,4#00+{KILL}"));
    assert_eq!(out, "-$E01#a6+");
    assert_eq!(target.bus.accesses, 0);
}

#[test]
fn test_unknown_command_gets_empty_reply() {
    let (_, out, _) = run(&format!("$X#58+{KILL}"));
    assert_eq!(out, "+$#00+");
}

#[test]
fn test_empty_packet_is_unknown() {
    let (_, out, _) = run(&format!("$#00+{KILL}"));
    assert_eq!(out, "+$#00+");
}

#[test]
fn test_null_address_guard() {
    let host = format!("$m0,4#fd+{}{KILL}", request("M0,4:00000000"));
    let (_, out, target) = run(&host);
    assert_eq!(out, format!("+$E14#aa{}+", reply("E14")));
    assert_eq!(target.bus.accesses, 0);
}

#[test]
fn test_write_memory() {
    let (_, out, target) = run(&format!("$M1000,4:deadbeef#c8+{KILL}"));
    assert_eq!(out, "+$OK#9a+");
    assert_eq!(&target.bus.bytes[..4], &[0xde, 0xad, 0xbe, 0xef]);
}

#[test]
fn test_memory_engine_failure_replies_e01() {
    let host = format!(
        "{}{}{}{KILL}",
        request("m2000,4"),
        request("M1000,2:zz00"),
        request("m1000,400")
    );
    let (_, out, target) = run(&host);
    let expected = format!("{}{}{}+", reply("E01"), reply("E01"), reply("E01"));
    assert_eq!(out, expected);
    assert_eq!(&target.bus.bytes[..2], &[0x01, 0x02]);
}

#[test]
fn test_write_with_trailing_hex_is_rejected() {
    let host = format!("{}{}{KILL}", request("M1000,1:aabb"), request("m1000,2"));
    let (_, out, target) = run(&host);
    assert_eq!(out, format!("{}{}+", reply("E01"), reply("0102")));
    assert_eq!(&target.bus.bytes[..2], &[0x01, 0x02]);
}

#[test]
fn test_memory_map_denies_write() {
    let region = MemoryRegion::new(BASE, BASE + 0x10, Permissions::READ, 4);
    let config = StubConfig::new().with_memory_map(vec![region]);
    let mut session = GdbStubSession::new(config);
    let mut target = MockTarget::new();
    let host = format!("{}{}{KILL}", request("m1001,2"), request("M1000,1:ff"));
    let (res, out) = run_with(&mut session, &mut target, &host);
    assert_eq!(res.unwrap(), Outcome::Kill);
    assert_eq!(out, format!("{}{}+", reply("0203"), reply("E01")));
    assert_eq!(target.bus.bytes[0], 0x01);
}

#[test]
fn test_breakpoints() {
    let host = [
        request("Z0,1000,4"),
        request("Z1,1004,4"),
        request("Z2,1000,4"),
        request("Z0,dead,4"),
        request("Z9,1000,4"),
        request("z0,1000,4"),
        request("z0,1000,4"),
        KILL.to_string(),
    ]
    .concat();
    let (_, out, target) = run(&host);
    let expected = [
        reply("OK"),
        reply("OK"),
        reply(""),
        reply("E01"),
        reply(""),
        reply("OK"),
        reply("E01"),
        "+".to_string(),
    ]
    .concat();
    assert_eq!(out, expected);
    let hardware = (BreakpointKind::Hardware, 0x1004);
    assert_eq!(target.breakpoints, vec![hardware]);
}

#[test]
fn test_watchpoint_not_supported_is_empty_reply() {
    let (_, out, _) = run(&format!("{}{KILL}", request("Z3,1000,4")));
    assert_eq!(out, "+$#00+");
}

#[test]
fn test_halt_reason() {
    let (_, out, _) = run(&format!("$?#3f+{KILL}"));
    assert_eq!(out, "+$T05#b9+");
}

#[test]
fn test_register_requests() {
    let host = [
        request("g"),
        request("p1"),
        request("P0=01000000"),
        request("p0"),
        request("G0200000003000000"),
        request("p5"),
        request("G00"),
        request("P1=zz"),
        KILL.to_string(),
    ]
    .concat();
    let (_, out, target) = run(&host);
    let expected = [
        reply("44332211ddccbbaa"),
        reply("ddccbbaa"),
        reply("OK"),
        reply("01000000"),
        reply("OK"),
        reply("E01"),
        reply("E01"),
        reply("E01"),
        "+".to_string(),
    ]
    .concat();
    assert_eq!(out, expected);
    assert_eq!(target.regs, [2, 3]);
}

#[test]
fn test_query_supported_reports_packet_size() {
    let (_, out, _) = run(&format!("$qSupported:multiprocess+;swbreak+#1b+{KILL}"));
    assert_eq!(out, format!("{}+", reply("PacketSize=100")));
}

#[test]
fn test_parse_failure_replies_e01_and_continues() {
    let host = format!("{}{}{KILL}", request("m1000"), request("m1000,1"));
    let (outcome, out, _) = run(&host);
    assert_eq!(outcome, Outcome::Kill);
    assert_eq!(out, format!("{}{}+", reply("E01"), reply("01")));
}

#[test]
fn test_oversized_packet_is_nacked() {
    let mut target = MockTarget::new();
    let config = StubConfig::new().with_packet_size(MIN_PACKET_SIZE);
    let mut session = GdbStubSession::new(config);
    let long = format!("q{}", "x".repeat(MIN_PACKET_SIZE));
    let host = format!("{}{}{KILL}", request(&long), request("?"));
    let (res, out) = run_with(&mut session, &mut target, &host);
    assert_eq!(res.unwrap(), Outcome::Kill);
    assert_eq!(out, format!("-{}{}+", packet("E01"), reply("T05")));
}

#[test]
fn test_packet_exactly_at_capacity_fits() {
    let mut target = MockTarget::new();
    let config = StubConfig::new().with_packet_size(MIN_PACKET_SIZE);
    let mut session = GdbStubSession::new(config);
    let full = format!("q{}", "x".repeat(MIN_PACKET_SIZE - 1));
    let host = format!("{}{KILL}", request(&full));
    let (res, out) = run_with(&mut session, &mut target, &host);
    assert_eq!(res.unwrap(), Outcome::Kill);
    assert_eq!(out, format!("{}+", reply("")));
}

#[test]
fn test_nak_of_reply_does_not_end_session() {
    let (outcome, out, _) = run(&format!("$?#3f-{KILL}"));
    assert_eq!(outcome, Outcome::Kill);
    assert_eq!(out, "+$T05#b9+");
}

#[test]
fn test_continue_and_step_return_to_caller() {
    let (outcome, out, target) = run("$c#63");
    let resume = Resume::Continue { addr: None };
    assert_eq!(outcome, Outcome::Resume(resume));
    assert_eq!(out, "+");
    assert_eq!(target.resumed, vec!["continue"]);

    let (outcome, _, target) = run(&packet("s8000"));
    let resume = Resume::Step { addr: Some(0x8000) };
    assert_eq!(outcome, Outcome::Resume(resume));
    assert_eq!(target.resumed, vec!["step"]);
}

#[test]
fn test_first_entry_suppresses_stop_packet() {
    let mut target = MockTarget::new();
    let mut session = GdbStubSession::new(StubConfig::new());
    assert!(session.is_first_entry());

    let (res, out) = run_with(&mut session, &mut target, "$c#63");
    let resume = Resume::Continue { addr: None };
    assert_eq!(res.unwrap(), Outcome::Resume(resume));
    assert_eq!(out, "+");
    assert!(!session.is_first_entry());

    // Re-entry after the target trapped: stop announced before any request.
    let (res, out) = run_with(&mut session, &mut target, &format!("+{KILL}"));
    assert_eq!(res.unwrap(), Outcome::Kill);
    assert_eq!(out, "$T05#b9+");
}

#[test]
fn test_detach_resets_session() {
    let mut target = MockTarget::new();
    let mut session = GdbStubSession::new(StubConfig::new());
    let (res, out) = run_with(&mut session, &mut target, "$c#63");
    res.unwrap();
    assert_eq!(out, "+");

    let (res, out) = run_with(&mut session, &mut target, "+$D#44+");
    assert_eq!(res.unwrap(), Outcome::Detach);
    assert_eq!(out, "$T05#b9+$OK#9a");
    assert!(session.is_first_entry());

    let (res, out) = run_with(&mut session, &mut target, KILL);
    assert_eq!(res.unwrap(), Outcome::Kill);
    assert_eq!(out, "+");
}

#[test]
fn test_host_disconnect_ends_session_with_error() {
    let mut target = MockTarget::new();
    let mut session = GdbStubSession::new(StubConfig::new());
    let (res, out) = run_with(&mut session, &mut target, &request("?"));
    assert!(matches!(res, Err(StubError::Transport(_))));
    assert_eq!(out, "+$T05#b9");
}

#[test]
fn test_start_initializes_target() {
    let mut target = MockTarget::new();
    let mut transport = StreamTransport::new(Cursor::new(Vec::new()), Vec::new());
    let config = StubConfig::new();
    let session = GdbStubSession::start(config, &mut transport, &mut target).unwrap();
    assert!(target.initialized);
    assert!(session.is_first_entry());

    let mut target = MockTarget::new();
    target.fail_init = true;
    let config = StubConfig::new();
    let err = GdbStubSession::start(config, &mut transport, &mut target)
        .err()
        .unwrap();
    assert!(matches!(err, StubError::Target(TargetError::Other(_))));
}
