#![allow(clippy::len_without_is_empty)]
#![allow(clippy::new_without_default)]

//! The domain layer for talking to a MythTV-compatible backend: connection
//! handshake and announcement, recorded-program and channel value objects,
//! recorder handles, file transfer, and the live-TV chain — all built on
//! the wire-level primitives in `myth-proto`.

pub mod chain;
pub mod channel;
pub mod connection;
pub mod event;
pub mod file_transfer;
pub mod freespace;
pub mod program;
pub mod recorder;

pub use chain::{Chain, ChainState};
pub use channel::{Channel, ChannelList};
pub use connection::{Connection, Role};
pub use event::{Event, EventConnection, EventKind};
pub use file_transfer::{FileTransfer, SeekWhence};
pub use freespace::FreeSpace;
pub use program::{ProgramInfo, ProgramList, RecStatus};
pub use recorder::{ChannelDir, Recorder};

pub use myth_proto::error::{Error, Result};
pub use myth_proto::logging::{discard as default_logger, Logger};

/// The default TCP port a myth-compatible backend listens on.
pub const DEFAULT_PORT: u16 = 6543;

/// Receive-buffer size recommended for control/event streams: small buffers
/// starve nothing here since these sockets carry only framed text, but a
/// too-large buffer has been observed to stall the handshake.
pub const CONTROL_RCVBUF: usize = 4 * 1024;

/// Receive-buffer size recommended for file-transfer/ring-buffer data
/// streams: too small starves streaming playback.
pub const DATA_RCVBUF: usize = 128 * 1024;
