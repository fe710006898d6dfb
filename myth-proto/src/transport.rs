//! The framed transport: a single blocking `TcpStream` plus the read-buffer
//! bookkeeping needed to pull one length-prefixed reply off the wire at a
//! time. A `Transport` is not internally synchronized — callers (the
//! `Connection` types in `myth-client`) serialize request/response pairs
//! with their own mutex, exactly as the C client serializes access to
//! `conn_mutex` around every `cmyth_send_message`/`cmyth_rcv_*` pair.

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::frame::{read_length_header, write_length_header};
use crate::select;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Matches the C client's hard-coded 5 second `alarm()` around `connect()`.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest a single reply body this transport will allocate for. Guards
/// against a malformed or hostile length header.
const MAX_REPLY_LEN: usize = 128 * 1024 * 1024;

pub struct Transport {
    stream: TcpStream,
    read_buf: Buffer,
    hung: bool,
}

impl Transport {
    /// Resolve `host:port` and connect with the standard 5 second timeout.
    pub fn connect(host: &str, port: u16) -> Result<Transport> {
        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::Protocol(format!("could not resolve {}:{}", host, port)))?;

        Self::connect_addr(addr, CONNECT_TIMEOUT)
    }

    pub fn connect_addr(addr: SocketAddr, timeout: Duration) -> Result<Transport> {
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        Ok(Transport::from_stream(stream))
    }

    pub fn from_stream(stream: TcpStream) -> Transport {
        Transport { stream, read_buf: Buffer::new(), hung: false }
    }

    /// Set the socket's receive buffer size: 4 KiB is right for control
    /// streams, 128 KiB for data streams — too small starves streaming
    /// playback, too large has been observed to stall the handshake.
    pub fn set_recv_buffer_size(&mut self, size: usize) -> Result<()> {
        let sock = socket2::SockRef::from(&self.stream);
        sock.set_recv_buffer_size(size)?;
        Ok(())
    }

    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Send a message body, length-prefixed.
    pub fn send_message(&mut self, body: &str) -> Result<()> {
        write_length_header(&mut self.stream, body.len())?;
        self.stream.write_all(body.as_bytes())?;
        self.stream.flush()?;
        Ok(())
    }

    /// Read the length header of the next reply.
    pub fn recv_length(&mut self) -> Result<usize> {
        read_length_header(&mut self.stream)
    }

    /// Read exactly `count` bytes of reply body.
    pub fn recv_string(&mut self, count: usize) -> Result<String> {
        if count > MAX_REPLY_LEN {
            return Err(Error::Protocol(format!("reply too large: {} bytes", count)));
        }

        self.read_buf.fill_exact(&mut self.stream, count)?;
        Ok(String::from_utf8_lossy(self.read_buf.as_slice()).into_owned())
    }

    /// Read a full length-prefixed reply in one call, the common case.
    pub fn recv_reply(&mut self) -> Result<String> {
        let len = self.recv_length()?;
        self.recv_string(len)
    }

    /// Non-blocking readiness check with a timeout, used by file-transfer
    /// and event connections to implement `select()`.
    pub fn select(&self, timeout: Duration) -> Result<bool> {
        select::wait_readable(&self.stream, timeout).map_err(Into::into)
    }

    /// Read raw, unframed bytes directly off the socket — used by
    /// file-transfer data connections, where the payload is the media
    /// stream itself rather than a length-prefixed reply.
    pub fn read_raw(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf).map_err(Into::into)
    }

    pub fn is_hung(&self) -> bool {
        self.hung
    }

    pub fn set_hung(&mut self, hung: bool) {
        self.hung = hung;
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.stream.peer_addr().map_err(Into::into)
    }

    /// Half-shutdown then close.
    pub fn close(&mut self) -> Result<()> {
        match self.stream.shutdown(std::net::Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn try_clone(&self) -> Result<Transport> {
        Ok(Transport {
            stream: self.stream.try_clone()?,
            read_buf: Buffer::new(),
            hung: self.hung,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_send_and_recv_reply_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();

            let mut header = [0u8; 8];
            stream.read_exact(&mut header).unwrap();
            let len: usize = std::str::from_utf8(&header).unwrap().trim().parse().unwrap();

            let mut body = vec![0u8; len];
            stream.read_exact(&mut body).unwrap();
            assert_eq!(&body, b"MYTH_PROTO_VERSION 77 WindMark");

            let reply = "ACCEPT";
            write_length_header(&mut stream, reply.len()).unwrap();
            stream.write_all(reply.as_bytes()).unwrap();
        });

        let mut transport = Transport::connect_addr(addr, Duration::from_secs(1)).unwrap();
        transport.send_message("MYTH_PROTO_VERSION 77 WindMark").unwrap();

        let reply = transport.recv_reply().unwrap();
        assert_eq!(reply, "ACCEPT");

        server.join().unwrap();
    }

    #[test]
    fn test_recv_rejects_oversized_length_header() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            // a length that fits the 8-byte ASCII header but still exceeds
            // the transport's sanity cap
            write_length_header(&mut stream, 200_000_000).unwrap();
        });

        let mut transport = Transport::connect_addr(addr, Duration::from_secs(1)).unwrap();
        let err = transport.recv_reply().unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));

        server.join().unwrap();
    }
}
