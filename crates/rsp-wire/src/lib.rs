//! GDB Remote Serial Protocol wire layer.
//!
//! Hex codec, `$payload#cc` packet framing with ACK/NAK, and the
//! [`ByteTransport`] seam that decouples the stub from UART, semihosting,
//! sockets or pipes.
//!
//! ```ignore
//! use rsp_wire::{StreamTransport, receive_packet, send_packet};
//!
//! let mut transport = StreamTransport::new(reader, writer);
//! let mut buf = [0u8; 256];
//! let len = receive_packet(&mut transport, &mut buf)?;
//! send_packet(&mut transport, b"OK")?;
//! ```

mod codec;
mod packet;
mod transport;

pub use codec::{
    CodecError, HEX_DIGITS, bin_to_hex, hex_digit, hex_to_bin, hex_value, parse_hex_u64,
};
pub use packet::{
    ACK, NAK, PACKET_END, PACKET_START, PacketError, checksum, receive_packet, send_packet,
};
pub use transport::{ByteTransport, StreamTransport};
