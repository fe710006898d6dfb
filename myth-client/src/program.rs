//! `ProgramInfo` / `ProgramList`: immutable value objects decoded from
//! control replies, plus the mutating commands that act on one program
//! (delete, bookmark, commercial-skip lists, ...). Grounded in the
//! `cmyth_proginfo_*` accessors declared in `cmyth.h` and the
//! `QUERY_RECORDINGS`/`QUERY_BOOKMARK` exchanges in `connection.c` and
//! `bookmark.c`.

use crate::connection::Connection;
use chrono::{DateTime, Utc};
use myth_proto::codec::{self, parse_status, Status};
use myth_proto::error::{Error, Result};
use myth_proto::timestamp;
use serde_derive::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;

/// `cmyth_proginfo_rec_status_t` — unchanged across protocol versions.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub enum RecStatus {
    Deleted = -5,
    Stopped = -4,
    Recorded = -3,
    Recording = -2,
    WillRecord = -1,
    DontRecord = 1,
    PreviousRecording = 2,
    CurrentRecording = 3,
    EarlierRecording = 4,
    TooManyRecordings = 5,
    Cancelled = 6,
    Conflict = 7,
    LaterShowing = 8,
    Repeat = 9,
    LowDiskspace = 11,
    TunerBusy = 12,
    Unknown(i32),
}

impl From<i32> for RecStatus {
    fn from(value: i32) -> Self {
        match value {
            -5 => RecStatus::Deleted,
            -4 => RecStatus::Stopped,
            -3 => RecStatus::Recorded,
            -2 => RecStatus::Recording,
            -1 => RecStatus::WillRecord,
            1 => RecStatus::DontRecord,
            2 => RecStatus::PreviousRecording,
            3 => RecStatus::CurrentRecording,
            4 => RecStatus::EarlierRecording,
            5 => RecStatus::TooManyRecordings,
            6 => RecStatus::Cancelled,
            7 => RecStatus::Conflict,
            8 => RecStatus::LaterShowing,
            9 => RecStatus::Repeat,
            11 => RecStatus::LowDiskspace,
            12 => RecStatus::TunerBusy,
            other => RecStatus::Unknown(other),
        }
    }
}

impl RecStatus {
    /// The wire-level integer this status decodes from/encodes to. A plain
    /// `as i32` cast isn't available here since `Unknown` carries a field.
    pub fn code(self) -> i32 {
        match self {
            RecStatus::Deleted => -5,
            RecStatus::Stopped => -4,
            RecStatus::Recorded => -3,
            RecStatus::Recording => -2,
            RecStatus::WillRecord => -1,
            RecStatus::DontRecord => 1,
            RecStatus::PreviousRecording => 2,
            RecStatus::CurrentRecording => 3,
            RecStatus::EarlierRecording => 4,
            RecStatus::TooManyRecordings => 5,
            RecStatus::Cancelled => 6,
            RecStatus::Conflict => 7,
            RecStatus::LaterShowing => 8,
            RecStatus::Repeat => 9,
            RecStatus::LowDiskspace => 11,
            RecStatus::TunerBusy => 12,
            RecStatus::Unknown(other) => other,
        }
    }
}

/// An immutable program record, shared by reference (`Arc`) once decoded.
#[derive(Debug, Clone, Serialize)]
pub struct ProgramInfo {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub category: String,
    pub chan_id: i32,
    pub chan_str: String,
    pub chan_sign: String,
    pub chan_name: String,
    pub pathname: String,
    pub host: String,
    pub port: u16,
    pub rec_start: DateTime<Utc>,
    pub rec_end: DateTime<Utc>,
    pub original_airdate: DateTime<Utc>,
    pub length_bytes: i64,
    pub rec_status: RecStatus,
    pub card_id: i32,
    pub flags: i32,
    pub rec_group: String,
    pub series_id: String,
    pub program_id: String,
}

/// Number of trailing fields a `QUERY_RECORDINGS`-family reply entry uses to
/// encode the 64-bit length, which is the only part of the layout that
/// actually diverges with protocol version.
fn int64_field_count(protocol_version: u32) -> usize {
    if protocol_version >= codec::INT64_SINGLE_FIELD_VERSION {
        1
    } else {
        2
    }
}

impl ProgramInfo {
    /// Decode one program record from an already-split field slice,
    /// returning the record and the number of fields consumed.
    pub fn decode(fields: &[&str], protocol_version: u32) -> Result<(ProgramInfo, usize)> {
        let mut idx = 0;
        let mut next = || -> Result<&str> {
            let field = fields
                .get(idx)
                .copied()
                .ok_or_else(|| Error::Protocol("truncated program record".into()))?;
            idx += 1;
            Ok(field)
        };

        let title = next()?.to_string();
        let subtitle = next()?.to_string();
        let description = next()?.to_string();
        let category = next()?.to_string();
        let chan_id = codec::parse_i32(next()?)?;
        let chan_str = next()?.to_string();
        let chan_sign = next()?.to_string();
        let chan_name = next()?.to_string();
        let pathname = next()?.to_string();

        let (length_bytes, consumed) = codec::decode_int64(&fields[idx..], protocol_version)?;
        idx += consumed;
        debug_assert_eq!(consumed, int64_field_count(protocol_version));

        let host = next()?.to_string();
        let port: u16 = next()?.parse().unwrap_or(6543);
        let rec_start = timestamp::parse(next()?)?;
        let rec_end = timestamp::parse(next()?)?;
        let rec_status = RecStatus::from(codec::parse_i32(next()?)?);
        let card_id = codec::parse_i32(next()?)?;
        let rec_group = next()?.to_string();
        let flags = codec::parse_i32(next()?)?;
        let series_id = next()?.to_string();
        let program_id = next()?.to_string();
        let original_airdate = timestamp::parse(next()?)?;

        Ok((
            ProgramInfo {
                title,
                subtitle,
                description,
                category,
                chan_id,
                chan_str,
                chan_sign,
                chan_name,
                pathname,
                host,
                port,
                rec_start,
                rec_end,
                original_airdate,
                length_bytes,
                rec_status,
                card_id,
                flags,
                rec_group,
                series_id,
                program_id,
            },
            idx,
        ))
    }

    pub fn length(&self) -> i64 {
        self.length_bytes
    }

    /// `DELETE_RECORDING <chan_id> <rec_start>`
    pub fn delete_recording(&self, conn: &Connection) -> Result<()> {
        self.simple_mutator(conn, "DELETE_RECORDING")
    }

    /// `UNDELETE_RECORDING <chan_id> <rec_start>`
    pub fn undelete_recording(&self, conn: &Connection) -> Result<()> {
        self.simple_mutator(conn, "UNDELETE_RECORDING")
    }

    /// `FORGET_RECORDING <chan_id> <rec_start>`
    pub fn forget_recording(&self, conn: &Connection) -> Result<()> {
        self.simple_mutator(conn, "FORGET_RECORDING")
    }

    /// `STOP_RECORDING <chan_id> <rec_start>`
    pub fn stop_recording(&self, conn: &Connection) -> Result<()> {
        self.simple_mutator(conn, "STOP_RECORDING")
    }

    fn simple_mutator(&self, conn: &Connection, command: &str) -> Result<()> {
        let body = format!("{} {} {}", command, self.chan_id, timestamp::format(&self.rec_start));
        conn.request_expect_ok(&body)
    }

    /// `QUERY_CHECK_RECORDING <chan_id> <rec_start>` — non-zero means the
    /// backend still considers this an in-progress recording.
    pub fn check_recording(&self, conn: &Connection) -> Result<bool> {
        let body = format!("QUERY_CHECK_RECORDING {} {}", self.chan_id, timestamp::format(&self.rec_start));
        let reply = conn.request(&body)?;
        Ok(codec::parse_i32(&reply).unwrap_or(0) != 0)
    }

    /// `QUERY_BOOKMARK <chan_id> <rec_start>` — offset is a single int64
    /// field on protocol >= 66, a hi/lo pair below it, matching `set_bookmark`.
    pub fn get_bookmark(&self, conn: &Connection) -> Result<i64> {
        let body = format!("QUERY_BOOKMARK {} {}", self.chan_id, timestamp::format(&self.rec_start));
        let reply = conn.request(&body)?;
        let fields = codec::split_fields(&reply);
        let (offset, _) = codec::decode_int64(&fields, conn.version())?;
        Ok(offset)
    }

    /// `SET_BOOKMARK <chan_id> <rec_start> <offset>` — offset is a single
    /// int64 field on protocol >= 66, a hi/lo pair below it.
    pub fn set_bookmark(&self, conn: &Connection, offset: i64) -> Result<()> {
        let mut parts = vec![
            "SET_BOOKMARK".to_string(),
            self.chan_id.to_string(),
            timestamp::format(&self.rec_start),
        ];
        let mut encoded = Vec::new();
        codec::encode_int64(&mut encoded, offset, conn.version());
        parts.extend(encoded);

        let body = parts.join(" ");
        let reply = conn.request(&body)?;
        match parse_status(&reply) {
            Status::Ok => Ok(()),
            Status::Error(msg) => Err(Error::Protocol(msg)),
        }
    }

    /// `QUERY_COMMBREAK <chan_id> <rec_start>`
    pub fn get_commbreak_list(&self, conn: &Connection) -> Result<String> {
        let body = format!("QUERY_COMMBREAK {} {}", self.chan_id, timestamp::format(&self.rec_start));
        conn.request(&body)
    }

    /// `QUERY_CUTLIST <chan_id> <rec_start>`
    pub fn get_cutlist(&self, conn: &Connection) -> Result<String> {
        let body = format!("QUERY_CUTLIST {} {}", self.chan_id, timestamp::format(&self.rec_start));
        conn.request(&body)
    }
}

/// An ordered sequence of [`ProgramInfo`] decoded from a single reply.
#[derive(Debug, Clone, Default)]
pub struct ProgramList {
    items: Vec<Arc<ProgramInfo>>,
}

impl ProgramList {
    pub fn decode(body: &str, protocol_version: u32) -> Result<ProgramList> {
        let fields = codec::split_fields(body);
        let mut items = Vec::new();
        let mut offset = 0;

        while offset < fields.len() && !(fields.len() == 1 && fields[0].is_empty()) {
            let (program, consumed) = ProgramInfo::decode(&fields[offset..], protocol_version)?;
            items.push(Arc::new(program));
            offset += consumed;
        }

        Ok(ProgramList { items })
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<ProgramInfo>> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ProgramInfo>> {
        self.items.iter()
    }

    /// Query commands that return a `ProgramList`: `QUERY_RECORDINGS Play`,
    /// `QUERY_GETALLPENDING`, `QUERY_GETALLSCHEDULED`, `QUERY_GETCONFLICTING`.
    pub fn query_recordings(conn: &Connection) -> Result<ProgramList> {
        let body = conn.request("QUERY_RECORDINGS Play")?;
        ProgramList::decode(&body, conn.version())
    }

    pub fn query_all_pending(conn: &Connection) -> Result<ProgramList> {
        let body = conn.request("QUERY_GETALLPENDING")?;
        ProgramList::decode(&body, conn.version())
    }

    pub fn query_all_scheduled(conn: &Connection) -> Result<ProgramList> {
        let body = conn.request("QUERY_GETALLSCHEDULED")?;
        ProgramList::decode(&body, conn.version())
    }

    /// `QUERY_GETCONFLICTING`. Decoded the same way as any other program
    /// list reply; the reported breakage in older clients traces to callers
    /// passing the wrong program as the query subject, not a wire-format
    /// divergence.
    pub fn query_conflicting(conn: &Connection) -> Result<ProgramList> {
        let body = conn.request("QUERY_GETCONFLICTING")?;
        ProgramList::decode(&body, conn.version())
    }

    /// Stable sort by `rec_start`.
    pub fn sort_by_date_recorded(&mut self) {
        self.items.sort_by(|a, b| cmp_timestamps(a.rec_start, b.rec_start));
    }

    /// Stable sort by `original_airdate`.
    pub fn sort_by_original_airdate(&mut self) {
        self.items.sort_by(|a, b| cmp_timestamps(a.original_airdate, b.original_airdate));
    }
}

fn cmp_timestamps(a: DateTime<Utc>, b: DateTime<Utc>) -> Ordering {
    a.cmp(&b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields(protocol_version: u32) -> String {
        let mut fields = vec![
            "Some Show".to_string(),
            "Pilot".to_string(),
            "A description".to_string(),
            "Drama".to_string(),
            "1001".to_string(),
            "5".to_string(),
            "KPIX".to_string(),
            "CBS 5".to_string(),
            "/recordings/1001_20200101120000.mpg".to_string(),
        ];
        codec::encode_int64(&mut fields, 1_048_576, protocol_version);
        fields.extend(vec![
            "backend1".to_string(),
            "6543".to_string(),
            "2020-01-01T12:00:00".to_string(),
            "2020-01-01T13:00:00".to_string(),
            "-3".to_string(),
            "0".to_string(),
            "Default".to_string(),
            "0".to_string(),
            "".to_string(),
            "".to_string(),
            "2020-01-01T00:00:00".to_string(),
        ]);
        codec::join_fields(fields)
    }

    #[test]
    fn test_decode_single_program_modern_protocol() {
        let body = sample_fields(77);
        let list = ProgramList::decode(&body, 77).unwrap();

        assert_eq!(list.count(), 1);
        let prog = list.get(0).unwrap();
        assert_eq!(prog.title, "Some Show");
        assert_eq!(prog.length_bytes, 1_048_576);
        assert_eq!(prog.rec_status.code(), RecStatus::Recorded.code());
    }

    #[test]
    fn test_decode_single_program_legacy_hilo_protocol() {
        let body = sample_fields(50);
        let list = ProgramList::decode(&body, 50).unwrap();

        assert_eq!(list.count(), 1);
        assert_eq!(list.get(0).unwrap().length_bytes, 1_048_576);
    }

    #[test]
    fn test_empty_list_decodes_to_zero_programs() {
        let list = ProgramList::decode("", 77).unwrap();
        assert_eq!(list.count(), 0);
    }

    #[test]
    fn test_sort_by_date_recorded_is_stable() {
        let mut list = ProgramList::decode(&sample_fields(77), 77).unwrap();
        list.sort_by_date_recorded();
        assert_eq!(list.count(), 1);
    }
}
