//! Storage free-space queries: the control command name, field layout, and
//! reported units all diverge by protocol version, so this
//! module centralizes the version-aware dispatch in one place rather than
//! scattering `if version >= N` checks through callers.
//!
//! - protocol >= 32: `QUERY_FREE_SPACE_SUMMARY` — a single total/used int64
//!   pair, in bytes.
//! - protocol >= 17: `QUERY_FREE_SPACE` — one repeated record per storage
//!   group directory; this module sums total/used across all of them.
//! - protocol < 17: `QUERY_FREESPACE` — a single total/used pair reported in
//!   KiB rather than bytes, scaled up by 1024 on decode.

use crate::connection::Connection;
use myth_proto::codec;
use myth_proto::error::{Error, Result};

const SUMMARY_MIN_VERSION: u32 = 32;
const PER_GROUP_MIN_VERSION: u32 = 17;

/// Fixed-width fields preceding the total/used pair in each `QUERY_FREE_SPACE`
/// storage-group record: hostname, directory, is-local, disk number, storage
/// group id, block size.
const PER_GROUP_FIXED_FIELDS: usize = 6;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FreeSpace {
    pub total_bytes: i64,
    pub used_bytes: i64,
}

impl FreeSpace {
    pub fn free_bytes(&self) -> i64 {
        self.total_bytes - self.used_bytes
    }
}

fn int64_width(protocol_version: u32) -> usize {
    if protocol_version >= codec::INT64_SINGLE_FIELD_VERSION {
        1
    } else {
        2
    }
}

/// Query aggregate storage free space, dispatching to the command and field
/// layout appropriate to `conn`'s negotiated protocol version.
pub fn query(conn: &Connection) -> Result<FreeSpace> {
    let version = conn.version();

    if version >= SUMMARY_MIN_VERSION {
        query_summary(conn, version)
    } else if version >= PER_GROUP_MIN_VERSION {
        query_per_group(conn, version)
    } else {
        query_legacy(conn)
    }
}

fn query_summary(conn: &Connection, version: u32) -> Result<FreeSpace> {
    let reply = conn.request("QUERY_FREE_SPACE_SUMMARY")?;
    let fields = codec::split_fields(&reply);

    let (total_bytes, consumed) = codec::decode_int64(&fields, version)?;
    let (used_bytes, _) = codec::decode_int64(&fields[consumed..], version)?;

    Ok(FreeSpace { total_bytes, used_bytes })
}

fn query_per_group(conn: &Connection, version: u32) -> Result<FreeSpace> {
    let reply = conn.request("QUERY_FREE_SPACE")?;
    let fields = codec::split_fields(&reply);

    let width = int64_width(version);
    let record_len = PER_GROUP_FIXED_FIELDS + 2 * width;

    if record_len == 0 || fields.len() % record_len != 0 {
        return Err(Error::Protocol(format!("malformed QUERY_FREE_SPACE reply: {} fields", fields.len())));
    }

    let mut total_bytes = 0i64;
    let mut used_bytes = 0i64;
    let mut idx = 0;

    while idx + record_len <= fields.len() {
        let (total, _) = codec::decode_int64(&fields[idx + PER_GROUP_FIXED_FIELDS..], version)?;
        let (used, _) = codec::decode_int64(&fields[idx + PER_GROUP_FIXED_FIELDS + width..], version)?;
        total_bytes += total;
        used_bytes += used;
        idx += record_len;
    }

    Ok(FreeSpace { total_bytes, used_bytes })
}

fn query_legacy(conn: &Connection) -> Result<FreeSpace> {
    let reply = conn.request("QUERY_FREESPACE")?;
    let fields = codec::split_fields(&reply);

    if fields.len() < 2 {
        return Err(Error::Protocol(format!("malformed QUERY_FREESPACE reply: {:?}", reply)));
    }

    let total_kib = codec::parse_i64(fields[0])?;
    let used_kib = codec::parse_i64(fields[1])?;

    Ok(FreeSpace { total_bytes: total_kib * 1024, used_bytes: used_kib * 1024 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_bytes_is_total_minus_used() {
        let fs = FreeSpace { total_bytes: 1000, used_bytes: 400 };
        assert_eq!(fs.free_bytes(), 600);
    }

    #[test]
    fn test_int64_width_by_version() {
        assert_eq!(int64_width(77), 1);
        assert_eq!(int64_width(50), 2);
    }
}
