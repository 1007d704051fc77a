//! Host links: a TCP socket for `target remote :PORT`, or stdin/stdout
//! for `target remote | rsp serve --stdio`.

use std::io::{self, BufWriter, Stdin, Stdout};
use std::net::{SocketAddr, TcpListener, TcpStream};

use rsp_wire::StreamTransport;

/// Transport over an accepted TCP connection.
pub type TcpTransport = StreamTransport<TcpStream, BufWriter<TcpStream>>;

/// Transport over the process's standard streams.
pub type StdioTransport = StreamTransport<Stdin, Stdout>;

/// Expand `:PORT` to a loopback address; anything else is used as given.
#[must_use]
pub fn normalize_listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("127.0.0.1{addr}")
    } else {
        addr.to_string()
    }
}

/// Bind a listener for the debugger.
///
/// # Errors
///
/// The address is invalid or already in use.
pub fn bind(addr: &str) -> io::Result<TcpListener> {
    TcpListener::bind(normalize_listen_addr(addr))
}

/// Wait for the debugger to connect.
///
/// # Errors
///
/// Accepting or configuring the socket fails.
pub fn accept(listener: &TcpListener) -> io::Result<(TcpTransport, SocketAddr)> {
    let (stream, peer) = listener.accept()?;
    stream.set_nodelay(true)?;
    let reader = stream.try_clone()?;
    Ok((StreamTransport::new(reader, BufWriter::new(stream)), peer))
}

/// Transport over stdin and stdout.
#[must_use]
pub fn stdio() -> StdioTransport {
    StreamTransport::new(io::stdin(), io::stdout())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_listen_addr() {
        assert_eq!(normalize_listen_addr(":1234"), "127.0.0.1:1234");
        assert_eq!(normalize_listen_addr("0.0.0.0:3333"), "0.0.0.0:3333");
    }
}
