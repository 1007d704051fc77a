//! Request parsing.

use rsp_wire::parse_hex_u64;
use thiserror::Error;

/// A packet whose fields could not be parsed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing {0} field")]
    MissingField(&'static str),

    #[error("malformed {0} field")]
    BadNumber(&'static str),
}

/// `z`/`Z` arguments as sent by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BreakpointSpec {
    pub type_id: u64,
    pub addr: u64,
    pub size: u64,
}

/// One decoded request. Hex payloads are borrowed undecoded from the packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// `m addr,len`
    ReadMemory { addr: u64, len: usize },
    /// `M addr,len:XX..`
    WriteMemory {
        addr: u64,
        len: usize,
        data: &'a [u8],
    },
    /// `c [addr]`
    Continue { addr: Option<u64> },
    /// `s [addr]`
    Step { addr: Option<u64> },
    /// `g`
    ReadRegisters,
    /// `G XX..`
    WriteRegisters { data: &'a [u8] },
    /// `p n`
    ReadRegister { id: u32 },
    /// `P n=XX..`
    WriteRegister { id: u32, value: &'a [u8] },
    /// `Z type,addr,kind`
    InsertBreakpoint(BreakpointSpec),
    /// `z type,addr,kind`
    RemoveBreakpoint(BreakpointSpec),
    /// `?`
    HaltReason,
    /// `qSupported[:features]`
    QuerySupported,
    /// `D[;pid]`
    Detach,
    /// `k`
    Kill,
    /// Anything else, answered with an empty packet.
    Unknown,
}

impl<'a> Command<'a> {
    /// Parse a deframed payload.
    ///
    /// # Errors
    ///
    /// A recognised command with missing or malformed fields.
    pub fn parse(payload: &'a [u8]) -> Result<Self, ParseError> {
        let Some((&letter, body)) = payload.split_first() else {
            return Ok(Self::Unknown);
        };

        let cmd = match letter {
            b'm' => {
                let (addr, len) = addr_len(body)?;
                Self::ReadMemory { addr, len }
            }
            b'M' => {
                let missing = ParseError::MissingField("data");
                let (head, data) = split_once(body, b':').ok_or(missing)?;
                let (addr, len) = addr_len(head)?;
                Self::WriteMemory { addr, len, data }
            }
            b'c' => Self::Continue {
                addr: optional_hex(body, "address")?,
            },
            b's' => Self::Step {
                addr: optional_hex(body, "address")?,
            },
            b'g' => Self::ReadRegisters,
            b'G' => Self::WriteRegisters { data: body },
            b'p' => Self::ReadRegister {
                id: register_id(body)?,
            },
            b'P' => {
                let missing = ParseError::MissingField("value");
                let (id, value) = split_once(body, b'=').ok_or(missing)?;
                Self::WriteRegister {
                    id: register_id(id)?,
                    value,
                }
            }
            b'Z' => Self::InsertBreakpoint(breakpoint(body)?),
            b'z' => Self::RemoveBreakpoint(breakpoint(body)?),
            b'?' => Self::HaltReason,
            b'D' => Self::Detach,
            b'k' => Self::Kill,
            b'q' if is_query(body, b"Supported") => Self::QuerySupported,
            _ => Self::Unknown,
        };
        Ok(cmd)
    }
}

/// `name` alone or followed by `:`.
fn is_query(body: &[u8], name: &[u8]) -> bool {
    matches!(body.strip_prefix(name), Some([] | [b':', ..]))
}

fn split_once(field: &[u8], sep: u8) -> Option<(&[u8], &[u8])> {
    let at = field.iter().position(|&b| b == sep)?;
    Some((&field[..at], &field[at + 1..]))
}

fn hex(field: &[u8], name: &'static str) -> Result<u64, ParseError> {
    if field.is_empty() {
        return Err(ParseError::MissingField(name));
    }
    parse_hex_u64(field).ok_or(ParseError::BadNumber(name))
}

fn optional_hex(field: &[u8], name: &'static str) -> Result<Option<u64>, ParseError> {
    if field.is_empty() {
        Ok(None)
    } else {
        hex(field, name).map(Some)
    }
}

fn addr_len(field: &[u8]) -> Result<(u64, usize), ParseError> {
    let missing = ParseError::MissingField("length");
    let (addr, len) = split_once(field, b',').ok_or(missing)?;
    let addr = hex(addr, "address")?;
    let len = hex(len, "length")?;
    let bad = ParseError::BadNumber("length");
    let len = usize::try_from(len).map_err(|_| bad)?;
    Ok((addr, len))
}

fn register_id(field: &[u8]) -> Result<u32, ParseError> {
    let id = hex(field, "register")?;
    let bad = ParseError::BadNumber("register");
    u32::try_from(id).map_err(|_| bad)
}

fn breakpoint(field: &[u8]) -> Result<BreakpointSpec, ParseError> {
    let mut parts = field.splitn(3, |&b| b == b',');
    let type_id = hex(parts.next().unwrap_or_default(), "type")?;
    let addr = parts.next().ok_or(ParseError::MissingField("address"))?;
    let addr = hex(addr, "address")?;
    // Conditions or commands after `;` are not supported and are ignored.
    let kind = parts.next().ok_or(ParseError::MissingField("kind"))?;
    let kind = kind.split(|&b| b == b';').next().unwrap_or_default();
    let size = hex(kind, "kind")?;
    Ok(BreakpointSpec {
        type_id,
        addr,
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use ParseError::{BadNumber, MissingField};

    fn parse(payload: &str) -> Result<Command<'_>, ParseError> {
        Command::parse(payload.as_bytes())
    }

    #[test]
    fn test_parse_memory_requests() {
        let read = Command::ReadMemory {
            addr: 0x1000,
            len: 4,
        };
        assert_eq!(parse("m1000,4"), Ok(read));
        let write = Command::WriteMemory {
            addr: 0x20,
            len: 2,
            data: b"abcd",
        };
        assert_eq!(parse("M20,2:abcd"), Ok(write));
    }

    #[test]
    fn test_parse_memory_errors() {
        assert_eq!(parse("m1000"), Err(MissingField("length")));
        assert_eq!(parse("mxyz,4"), Err(BadNumber("address")));
        assert_eq!(parse("m,4"), Err(MissingField("address")));
        assert_eq!(parse("m10,100000000000000000"), Err(BadNumber("length")));
        assert_eq!(parse("M1000,4"), Err(MissingField("data")));
    }

    #[test]
    fn test_parse_resume_with_optional_address() {
        assert_eq!(parse("c"), Ok(Command::Continue { addr: None }));
        let addr = Some(0x8000);
        assert_eq!(parse("c8000"), Ok(Command::Continue { addr }));
        assert_eq!(parse("s"), Ok(Command::Step { addr: None }));
        assert_eq!(parse("sqq"), Err(BadNumber("address")));
    }

    #[test]
    fn test_parse_register_requests() {
        assert_eq!(parse("g"), Ok(Command::ReadRegisters));
        let data = b"0011".as_slice();
        assert_eq!(parse("G0011"), Ok(Command::WriteRegisters { data }));
        assert_eq!(parse("p20"), Ok(Command::ReadRegister { id: 0x20 }));
        let write = Command::WriteRegister {
            id: 0x1f,
            value: b"78563412",
        };
        assert_eq!(parse("P1f=78563412"), Ok(write));
        assert_eq!(parse("p"), Err(MissingField("register")));
        assert_eq!(parse("p100000000"), Err(BadNumber("register")));
        assert_eq!(parse("P1f"), Err(MissingField("value")));
    }

    #[test]
    fn test_parse_breakpoints() {
        let spec = BreakpointSpec {
            type_id: 0,
            addr: 0x1000,
            size: 4,
        };
        assert_eq!(parse("Z0,1000,4"), Ok(Command::InsertBreakpoint(spec)));
        let remove = Command::RemoveBreakpoint(spec);
        assert_eq!(parse("z0,1000,4;X1,0"), Ok(remove));
        assert_eq!(parse("Z2,1000"), Err(MissingField("kind")));
        assert_eq!(parse("Z"), Err(MissingField("type")));
    }

    #[test]
    fn test_parse_queries_and_misc() {
        assert_eq!(parse("?"), Ok(Command::HaltReason));
        let supported = parse("qSupported:multiprocess+;swbreak+");
        assert_eq!(supported, Ok(Command::QuerySupported));
        assert_eq!(parse("qSupported"), Ok(Command::QuerySupported));
        assert_eq!(parse("qSupportedX"), Ok(Command::Unknown));
        assert_eq!(parse("qAttached"), Ok(Command::Unknown));
        assert_eq!(parse("D;1"), Ok(Command::Detach));
        assert_eq!(parse("k"), Ok(Command::Kill));
        assert_eq!(parse("vCont?"), Ok(Command::Unknown));
        assert_eq!(parse(""), Ok(Command::Unknown));
    }
}
