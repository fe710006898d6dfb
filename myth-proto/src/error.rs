use std::fmt;
use std::io;

/// Errors surfaced by the framed transport and the field codec.
///
/// Mirrors the taxonomy the wire protocol actually needs: a handshake can be
/// rejected, a read can time out, a reply can carry `ERROR` or be malformed,
/// and the usual `io::Error` can bubble up from the socket.
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    /// The peer sent something that doesn't parse as a well-formed frame or field list.
    Protocol(String),
    /// A blocking read exceeded its deadline without completing.
    Timeout,
    /// The backend does not support the requested protocol version.
    VersionUnsupported(u32),
    /// A query returned `ERROR` or an otherwise-empty/negative result.
    NotFound,
    /// A caller passed a value the protocol cannot encode.
    InvalidArgument(String),
    /// The operation was cancelled (chain worker shutdown, explicit close).
    Cancelled,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {}", err),
            Error::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Error::Timeout => write!(f, "operation timed out"),
            Error::VersionUnsupported(v) => write!(f, "unsupported protocol version: {}", v),
            Error::NotFound => write!(f, "not found"),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Error::Timeout,
            _ => Error::Io(err),
        }
    }
}

pub type Result<T> = ::std::result::Result<T, Error>;
