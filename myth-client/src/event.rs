//! `EventConnection`: a dedicated connection that receives unsolicited
//! backend notifications instead of answering requests. Mirrors
//! `cmyth_event_t`/`cmyth_event_get`: every message on the wire is
//! `BACKEND_MESSAGE[]:[]<body>[]:[]empty`, where `<body>` is itself a
//! `[]:[]`-delimited list whose first field is the event's kind tag.

use crate::connection::{Connection, Role};
use myth_proto::codec;
use myth_proto::error::{Error, Result};
use myth_proto::logging::{debug, Logger};
use std::time::Duration;

/// The tagged event kinds a backend can push on the event connection. The
/// `Unknown` variant keeps a forward-compatible client from choking on a
/// kind tag it has never seen, matching the C client's policy of passing
/// unrecognized events through to the caller rather than dropping them.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum EventKind {
    Close,
    RecordingListChangeAdd,
    RecordingListChangeUpdate,
    RecordingListChangeDelete,
    RecordingListChange,
    ScheduleChange,
    DoneRecording,
    QuitLiveTv,
    WatchLiveTv,
    LiveTvChainUpdate,
    Signal,
    AskRecording,
    SystemEvent,
    UpdateFileSize,
    GeneratedPixmap,
    ClearSettingsCache,
    CommflagStart,
    Error,
    Unknown(String),
}

impl EventKind {
    fn from_tag(tag: &str) -> EventKind {
        match tag {
            "CLOSE" => EventKind::Close,
            "RECORDING_LIST_CHANGE ADD" => EventKind::RecordingListChangeAdd,
            "RECORDING_LIST_CHANGE UPDATE" => EventKind::RecordingListChangeUpdate,
            "RECORDING_LIST_CHANGE DELETE" => EventKind::RecordingListChangeDelete,
            "RECORDING_LIST_CHANGE" => EventKind::RecordingListChange,
            "SCHEDULE_CHANGE" => EventKind::ScheduleChange,
            "DONE_RECORDING" => EventKind::DoneRecording,
            "QUIT_LIVETV" => EventKind::QuitLiveTv,
            "WATCH_LIVETV" => EventKind::WatchLiveTv,
            "LIVETV_CHAIN_UPDATE" => EventKind::LiveTvChainUpdate,
            "SIGNAL" => EventKind::Signal,
            "ASK_RECORDING" => EventKind::AskRecording,
            "SYSTEM_EVENT" => EventKind::SystemEvent,
            "UPDATE_FILE_SIZE" => EventKind::UpdateFileSize,
            "GENERATED_PIXMAP" => EventKind::GeneratedPixmap,
            "CLEAR_SETTINGS_CACHE" => EventKind::ClearSettingsCache,
            "COMMFLAG_START" => EventKind::CommflagStart,
            "ERROR" => EventKind::Error,
            other => EventKind::Unknown(other.to_string()),
        }
    }
}

/// A single decoded backend event: its tagged kind and the remaining,
/// still-opaque payload fields (the `LIVETV_CHAIN_UPDATE` chain id, the
/// `SIGNAL` status string, and so on — interpretation is left to whichever
/// subscriber cares about that particular kind).
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub fields: Vec<String>,
}

const MESSAGE_PREFIX: &str = "BACKEND_MESSAGE";
/// Trailing sentinel field every `BACKEND_MESSAGE` carries; present purely
/// for wire compatibility and otherwise ignored.
const TRAILING_SENTINEL: &str = "empty";

/// A connection dedicated to unsolicited backend notifications, opened with
/// the event flag set during `ANN Playback`.
pub struct EventConnection {
    conn: Connection,
}

impl EventConnection {
    pub fn open(host: &str, port: u16, rcvbuf: usize, log: Logger) -> Result<EventConnection> {
        let conn = Connection::connect_event(host, port, rcvbuf, log)?;
        debug_assert_eq!(conn.role(), Role::Event);
        Ok(EventConnection { conn })
    }

    /// Block until the next event arrives and decode it.
    pub fn get_event(&self) -> Result<Event> {
        let mut transport = self.conn.lock_transport();
        let reply = transport.recv_reply()?;
        drop(transport);

        let fields = codec::split_fields(&reply);
        if fields.is_empty() || fields[0] != MESSAGE_PREFIX {
            return Err(Error::Protocol(format!("not a BACKEND_MESSAGE: {:?}", reply)));
        }

        // `BACKEND_MESSAGE[]:[]<body fields...>[]:[]empty` — drop the
        // leading prefix and, when present, the trailing sentinel.
        let mut body_fields: Vec<&str> = fields[1..].to_vec();
        if body_fields.last() == Some(&TRAILING_SENTINEL) {
            body_fields.pop();
        }

        if body_fields.is_empty() {
            return Err(Error::Protocol("BACKEND_MESSAGE with no body".into()));
        }

        let kind = EventKind::from_tag(body_fields[0]);
        debug!(self.conn.log(), "event received"; "kind" => format!("{:?}", kind));

        Ok(Event {
            kind,
            fields: body_fields[1..].iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Poll the event socket for readability without blocking past `timeout`.
    pub fn select(&self, timeout: Duration) -> Result<bool> {
        let transport = self.conn.lock_transport();
        transport.select(timeout)
    }

    pub fn close(&self) {
        self.conn.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_from_tag_known() {
        assert_eq!(EventKind::from_tag("LIVETV_CHAIN_UPDATE"), EventKind::LiveTvChainUpdate);
        assert_eq!(EventKind::from_tag("CLOSE"), EventKind::Close);
    }

    #[test]
    fn test_event_kind_from_tag_unknown_is_preserved() {
        assert_eq!(EventKind::from_tag("SOME_FUTURE_EVENT"), EventKind::Unknown("SOME_FUTURE_EVENT".to_string()));
    }

    #[test]
    fn test_recording_list_change_subtypes_distinct_from_bare_tag() {
        assert_ne!(EventKind::from_tag("RECORDING_LIST_CHANGE"), EventKind::from_tag("RECORDING_LIST_CHANGE ADD"));
    }
}
