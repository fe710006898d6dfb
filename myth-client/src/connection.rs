//! `Connection`: a [`myth_proto::transport::Transport`] paired with its
//! negotiated protocol version, role, and peer identity.

use myth_proto::codec::{parse_status, Status};
use myth_proto::error::{Error, Result};
use myth_proto::logging::{debug, Logger};
use myth_proto::transport::Transport;
use myth_proto::version::{self, VERSION_CACHE};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// The role a connection plays, matching the `ANN` variants the backend
/// understands.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Role {
    Control,
    Event,
    FileTransfer,
    RingBuffer,
}

static INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// The local machine's hostname, resolved once per process and reused for
/// every `ANN Playback` identity string.
fn local_hostname() -> &'static str {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    static mut HOSTNAME: Option<String> = None;

    unsafe {
        ONCE.call_once(|| {
            let resolved = process::Command::new("hostname")
                .output()
                .ok()
                .and_then(|out| String::from_utf8(out.stdout).ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "localhost".to_string());
            HOSTNAME = Some(resolved);
        });

        HOSTNAME.as_deref().unwrap()
    }
}

/// A control/event/file-transfer/ring-buffer connection to a backend.
pub struct Connection {
    transport: Mutex<Transport>,
    version: u32,
    host: String,
    port: u16,
    role: Role,
    log: Logger,
}

impl Connection {
    pub fn connect_ctrl(host: &str, port: u16, rcvbuf: usize, log: Logger) -> Result<Connection> {
        Self::connect(host, port, Role::Control, rcvbuf, log)
    }

    pub fn connect_event(host: &str, port: u16, rcvbuf: usize, log: Logger) -> Result<Connection> {
        Self::connect(host, port, Role::Event, rcvbuf, log)
    }

    fn connect(host: &str, port: u16, role: Role, rcvbuf: usize, log: Logger) -> Result<Connection> {
        let mut transport = Transport::connect(host, port)?;
        transport.set_recv_buffer_size(rcvbuf)?;

        let agreed_version = Self::handshake(&mut transport, host, &log)?;

        let mut conn = Connection {
            transport: Mutex::new(transport),
            version: agreed_version,
            host: host.to_string(),
            port,
            role,
            log,
        };

        conn.announce(role)?;

        Ok(conn)
    }

    /// Wrap an already-connected, already-handshaken transport (used by
    /// file-transfer, whose announce/reply shape differs from the others).
    pub(crate) fn from_parts(
        transport: Transport,
        version: u32,
        host: String,
        port: u16,
        role: Role,
        log: Logger,
    ) -> Connection {
        Connection { transport: Mutex::new(transport), version, host, port, role, log }
    }

    /// Negotiate a protocol version, retrying once on `REJECT`.
    pub(crate) fn handshake(transport: &mut Transport, host: &str, log: &Logger) -> Result<u32> {
        let mut trial = VERSION_CACHE.get(host).unwrap_or(version::CURRENT_VERSION);

        for attempt in 0..2 {
            let message = match version::handshake_token(trial) {
                Some(token) => format!("MYTH_PROTO_VERSION {} {}", trial, token),
                None => format!("MYTH_PROTO_VERSION {}", trial),
            };

            transport.send_message(&message)?;
            let reply = transport.recv_reply()?;

            debug!(log, "handshake reply"; "reply" => &reply, "trial" => trial);

            let mut parts = reply.split_whitespace();
            let verdict = parts.next().unwrap_or("");
            let peer_version: u32 = parts
                .next()
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| Error::Protocol(format!("malformed handshake reply: {:?}", reply)))?;
            let peer_version = version::normalize(peer_version);

            match verdict {
                "ACCEPT" => {
                    VERSION_CACHE.set(host, peer_version);
                    return Ok(peer_version);
                }
                "REJECT" => {
                    if attempt == 1 {
                        return Err(Error::VersionUnsupported(peer_version));
                    }
                    trial = peer_version;
                }
                _ => return Err(Error::Protocol(format!("unexpected handshake reply: {:?}", reply))),
            }
        }

        Err(Error::VersionUnsupported(trial))
    }

    fn announce(&mut self, role: Role) -> Result<()> {
        let message = match role {
            Role::Control => format!("ANN Playback {} 0", local_hostname()),
            Role::Event => {
                let instance = INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed);
                format!("ANN Playback {}_{}_{} 1", local_hostname(), process::id(), instance)
            }
            Role::RingBuffer | Role::FileTransfer => unreachable!(
                "ring-buffer and file-transfer connections announce through their own constructors"
            ),
        };

        let mut transport = self.transport.lock().unwrap();
        transport.send_message(&message)?;
        let reply = transport.recv_reply()?;

        match parse_status(&reply) {
            Status::Ok => Ok(()),
            Status::Error(msg) => Err(Error::Protocol(format!("ANN rejected: {}", msg))),
        }
    }

    /// Send `body` and return the length-prefixed reply, serialized on this
    /// connection's transport mutex so requests and replies are never
    /// interleaved.
    pub fn request(&self, body: &str) -> Result<String> {
        let mut transport = self.transport.lock().unwrap();
        transport.send_message(body)?;
        transport.recv_reply()
    }

    pub fn request_expect_ok(&self, body: &str) -> Result<()> {
        match parse_status(&self.request(body)?) {
            Status::Ok => Ok(()),
            Status::Error(msg) => Err(Error::Protocol(msg)),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn log(&self) -> &Logger {
        &self.log
    }

    pub fn lock_transport(&self) -> std::sync::MutexGuard<'_, Transport> {
        self.transport.lock().unwrap()
    }

    pub fn close(&self) {
        let mut transport = self.transport.lock().unwrap();
        let _ = transport.close();
    }
}

impl Connection {
    /// `ANN RingBuffer <host> <recorder-id>` — the legacy pre-26 live-TV
    /// transport. Unlike Control/Event this needs the recorder id at
    /// announce time, so it bypasses `Connection::connect`.
    pub fn connect_ring_for(host: &str, port: u16, rcvbuf: usize, recorder_id: i32, log: Logger) -> Result<Connection> {
        let mut transport = Transport::connect(host, port)?;
        transport.set_recv_buffer_size(rcvbuf)?;

        let agreed_version = Self::handshake(&mut transport, host, &log)?;

        let message = format!("ANN RingBuffer {} {}", local_hostname(), recorder_id);
        transport.send_message(&message)?;
        let reply = transport.recv_reply()?;

        match parse_status(&reply) {
            Status::Ok => {}
            Status::Error(msg) => return Err(Error::Protocol(format!("ANN RingBuffer rejected: {}", msg))),
        }

        Ok(Connection::from_parts(transport, agreed_version, host.to_string(), port, Role::RingBuffer, log))
    }
}

pub fn default_logger() -> Logger {
    myth_proto::logging::discard()
}

/// `ANN FileTransfer <host>[]:[]<path>[]:[]` — the data connection for a
/// file transfer skips the `MYTH_PROTO_VERSION` handshake entirely and just
/// inherits the already-negotiated version from the control connection that
/// is opening it.
pub(crate) fn connect_file_data(
    host: &str,
    port: u16,
    rcvbuf: usize,
    control_version: u32,
    pathname: &str,
    log: Logger,
) -> Result<(Connection, i64, u64)> {
    let mut transport = Transport::connect(host, port)?;
    transport.set_recv_buffer_size(rcvbuf)?;

    let announcement = if control_version >= 44 {
        format!("ANN FileTransfer {}[]:[]{}[]:[]", local_hostname(), pathname)
    } else {
        format!("ANN FileTransfer {}[]:[]{}", local_hostname(), pathname)
    };

    transport.send_message(&announcement)?;
    let reply = transport.recv_reply()?;
    let fields = myth_proto::codec::split_fields(&reply);

    if fields.is_empty() || fields[0] != "OK" {
        return Err(Error::Protocol(format!("ANN FileTransfer rejected: {}", reply)));
    }

    // OK + file-id + the length, itself a single field from protocol 66
    // onward but a hi/lo pair below it (connection.c's cmyth_rcv_uint64).
    let length_width = if control_version >= myth_proto::codec::INT64_SINGLE_FIELD_VERSION { 1 } else { 2 };
    if fields.len() < 2 + length_width {
        return Err(Error::Protocol(format!("short ANN FileTransfer reply: {}", reply)));
    }

    let file_id: i64 = fields[1]
        .trim()
        .parse()
        .map_err(|_| Error::Protocol(format!("malformed file id: {:?}", fields[1])))?;
    let (file_length, _) = myth_proto::codec::decode_int64(&fields[2..], control_version)?;
    let file_length = file_length as u64;

    let conn = Connection::from_parts(transport, control_version, host.to_string(), port, Role::FileTransfer, log);
    Ok((conn, file_id, file_length))
}

#[cfg(test)]
mod tests {
    use super::*;
    use myth_proto::logging::discard;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_connect_file_data_decodes_single_field_length_on_modern_protocol() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();

            let mut header = [0u8; 8];
            stream.read_exact(&mut header).unwrap();
            let len: usize = std::str::from_utf8(&header).unwrap().trim().parse().unwrap();
            let mut body = vec![0u8; len];
            stream.read_exact(&mut body).unwrap();

            let reply = "OK[]:[]42[]:[]1048576";
            myth_proto::frame::write_length_header(&mut stream, reply.len()).unwrap();
            stream.write_all(reply.as_bytes()).unwrap();
        });

        let (_conn, file_id, file_length) =
            connect_file_data(&addr.ip().to_string(), addr.port(), 4096, 77, "/rec.mpg", discard()).unwrap();

        assert_eq!(file_id, 42);
        assert_eq!(file_length, 1_048_576);
        server.join().unwrap();
    }

    #[test]
    fn test_connect_file_data_decodes_hilo_length_on_legacy_protocol() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();

            let mut header = [0u8; 8];
            stream.read_exact(&mut header).unwrap();
            let len: usize = std::str::from_utf8(&header).unwrap().trim().parse().unwrap();
            let mut body = vec![0u8; len];
            stream.read_exact(&mut body).unwrap();

            // A length too large to fit a single 32-bit field, split hi/lo,
            // the way a pre-66 backend answers ANN FileTransfer.
            let mut fields = vec!["OK".to_string(), "7".to_string()];
            myth_proto::codec::encode_int64(&mut fields, 5_000_000_000, 50);
            let reply = myth_proto::codec::join_fields(fields);

            myth_proto::frame::write_length_header(&mut stream, reply.len()).unwrap();
            stream.write_all(reply.as_bytes()).unwrap();
        });

        let (_conn, file_id, file_length) =
            connect_file_data(&addr.ip().to_string(), addr.port(), 4096, 50, "/rec.mpg", discard()).unwrap();

        assert_eq!(file_id, 7);
        assert_eq!(file_length, 5_000_000_000);
        server.join().unwrap();
    }
}
