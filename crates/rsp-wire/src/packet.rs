//! `$payload#cc` packet framing.
//!
//! The checksum is the sum of the payload bytes modulo 256, sent as two hex
//! digits. Every packet is acknowledged by the receiver with a single `+`
//! (accepted) or `-` (rejected) byte.

use std::io;

use thiserror::Error;
use tracing::{trace, warn};

use crate::codec::{hex_digit, hex_value};
use crate::transport::ByteTransport;

/// Start-of-packet marker.
pub const PACKET_START: u8 = b'$';
/// End-of-payload marker, followed by two checksum digits.
pub const PACKET_END: u8 = b'#';
/// Positive acknowledgement.
pub const ACK: u8 = b'+';
/// Negative acknowledgement.
pub const NAK: u8 = b'-';

/// Packet framing errors.
#[derive(Debug, Error)]
pub enum PacketError {
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("malformed checksum digits {0:?}")]
    MalformedChecksum([u8; 2]),

    #[error("checksum mismatch: packet says {expected:#04x}, payload sums to {computed:#04x}")]
    ChecksumMismatch { expected: u8, computed: u8 },

    #[error("packet of {received} bytes exceeds buffer capacity {capacity}")]
    Overflow { received: usize, capacity: usize },

    #[error("host answered {0:#04x} instead of ACK")]
    NotAcknowledged(u8),
}

/// Sum of `payload` modulo 256.
#[must_use]
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Send `payload` as one packet and wait for the host's acknowledgement.
///
/// No retransmission is attempted: a `-` (or any byte other than `+`) is
/// returned to the caller as [`PacketError::NotAcknowledged`].
///
/// # Errors
///
/// Transport failures, or a reply other than ACK.
pub fn send_packet<T: ByteTransport + ?Sized>(
    transport: &mut T,
    payload: &[u8],
) -> Result<(), PacketError> {
    let sum = checksum(payload);

    transport.write_byte(PACKET_START)?;
    transport.write_all(payload)?;
    transport.write_byte(PACKET_END)?;
    transport.write_byte(hex_digit(sum >> 4))?;
    transport.write_byte(hex_digit(sum))?;
    transport.flush()?;
    trace!(len = payload.len(), checksum = sum, "sent packet");

    match transport.read_byte()? {
        ACK => Ok(()),
        other => {
            warn!(reply = other, "packet not acknowledged");
            Err(PacketError::NotAcknowledged(other))
        }
    }
}

/// Receive one packet into `buf`, returning the payload length.
///
/// Bytes before `$` are discarded. The checksum covers every payload byte
/// even once `buf` is full; only the first `buf.len()` bytes are stored. A
/// packet that fails its checksum or does not fit is answered with NAK and
/// no payload is delivered.
///
/// # Errors
///
/// Transport failures, a bad checksum, or a payload longer than `buf`.
pub fn receive_packet<T: ByteTransport + ?Sized>(
    transport: &mut T,
    buf: &mut [u8],
) -> Result<usize, PacketError> {
    let mut skipped = 0usize;
    while transport.read_byte()? != PACKET_START {
        skipped += 1;
    }
    if skipped > 0 {
        trace!(skipped, "discarded bytes before packet start");
    }

    let mut computed = 0u8;
    let mut received = 0usize;
    loop {
        let byte = transport.read_byte()?;
        if byte == PACKET_END {
            break;
        }
        if let Some(slot) = buf.get_mut(received) {
            *slot = byte;
        }
        computed = computed.wrapping_add(byte);
        received += 1;
    }

    let digits = [transport.read_byte()?, transport.read_byte()?];
    let expected = match (hex_value(digits[0]), hex_value(digits[1])) {
        (Some(hi), Some(lo)) => (hi << 4) | lo,
        _ => return Err(reject(transport, PacketError::MalformedChecksum(digits))),
    };
    if expected != computed {
        return Err(reject(
            transport,
            PacketError::ChecksumMismatch { expected, computed },
        ));
    }
    if received > buf.len() {
        return Err(reject(
            transport,
            PacketError::Overflow {
                received,
                capacity: buf.len(),
            },
        ));
    }

    transport.write_byte(ACK)?;
    transport.flush()?;
    trace!(len = received, "received packet");
    Ok(received)
}

/// NAK the packet and hand back `err`, or the transport error if the NAK
/// itself cannot be sent.
fn reject<T: ByteTransport + ?Sized>(transport: &mut T, err: PacketError) -> PacketError {
    warn!(error = %err, "rejecting packet");
    match transport.write_byte(NAK).and_then(|()| transport.flush()) {
        Ok(()) => err,
        Err(io_err) => PacketError::Transport(io_err),
    }
}
