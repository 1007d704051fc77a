//! Byte transport abstraction.

use std::io::{self, BufReader, Read, Write};

/// Blocking byte-oriented link to the debugger host.
///
/// Implementations wrap a UART, a semihosting channel, a socket or a pipe.
/// `read_byte` blocks until a byte is available; end of stream is an error.
pub trait ByteTransport {
    /// Bring the link up. Called once before the first packet.
    ///
    /// # Errors
    ///
    /// The link cannot be opened.
    fn init(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Read one byte, blocking until available.
    ///
    /// # Errors
    ///
    /// The link failed or the host closed it.
    fn read_byte(&mut self) -> io::Result<u8>;

    /// Write one byte.
    ///
    /// # Errors
    ///
    /// The link failed or the host closed it.
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;

    /// Push any buffered output to the host.
    ///
    /// # Errors
    ///
    /// As for [`write_byte`](Self::write_byte).
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Write a whole buffer.
    ///
    /// # Errors
    ///
    /// As for [`write_byte`](Self::write_byte).
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        for &byte in bytes {
            self.write_byte(byte)?;
        }
        Ok(())
    }
}

impl<T: ByteTransport + ?Sized> ByteTransport for &mut T {
    fn init(&mut self) -> io::Result<()> {
        (**self).init()
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        (**self).read_byte()
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        (**self).write_byte(byte)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_all(bytes)
    }
}

/// Transport over any `std::io` reader/writer pair.
///
/// Reads are buffered; writes go straight to `W`, so wrap it in a
/// `BufWriter` when the sink is expensive per call.
pub struct StreamTransport<R, W> {
    reader: BufReader<R>,
    writer: W,
}

impl<R: Read, W: Write> StreamTransport<R, W> {
    /// Create a transport reading from `reader` and writing to `writer`.
    #[must_use]
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Borrow the output sink.
    #[must_use]
    pub const fn writer(&self) -> &W {
        &self.writer
    }

    /// Consume the transport, returning the reader and writer.
    #[must_use]
    pub fn into_parts(self) -> (R, W) {
        (self.reader.into_inner(), self.writer)
    }
}

impl<R: Read, W: Write> ByteTransport for StreamTransport<R, W> {
    fn read_byte(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        self.reader.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.writer.write_all(&[byte])
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_stream_transport_reads_until_eof() {
        let mut transport = StreamTransport::new(Cursor::new(b"ab".to_vec()), Vec::new());
        assert_eq!(transport.read_byte().unwrap(), b'a');
        assert_eq!(transport.read_byte().unwrap(), b'b');
        let err = transport.read_byte().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_stream_transport_writes_through() {
        let mut transport = StreamTransport::new(Cursor::new(Vec::new()), Vec::new());
        transport.write_byte(b'$').unwrap();
        transport.write_all(b"OK").unwrap();
        assert_eq!(transport.writer().as_slice(), b"$OK");
    }
}
