//! Transport abstraction: the two blocking I/O operations a [`crate::session::Session`]
//! needs from whatever byte stream carries 9P traffic.
//!
//! A client only owns one end of the connection and must stay
//! transport-agnostic: a TCP stream, a Unix socket, an in-memory pipe in
//! tests, or a 9P-over-anything tunnel should all work without the
//! session engine knowing which.

use std::io;

/// Minimal blocking transport: write a full request, read back exactly
/// as many bytes as asked.
///
/// Implemented for anything that is both [`io::Read`] and [`io::Write`]
/// (e.g. `TcpStream`, `UnixStream`) via the blanket impl below; provide a
/// custom impl for transports that don't compose that way.
pub trait Transport {
    /// Write the entirety of `buf` to the wire.
    fn send(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Fill `buf` completely from the wire.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<()>;
}

impl<T: io::Read + io::Write> Transport for T {
    fn send(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_all(buf)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.read_exact(buf)
    }
}
