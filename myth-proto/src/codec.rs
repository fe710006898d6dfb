//! The field codec: myth protocol messages are a single string with fields
//! separated by the literal delimiter `[]:[]`. Below protocol 66, 64-bit
//! integers are split into a signed high/low pair of 32-bit decimal fields;
//! from 66 onward they are sent as a single decimal field. All of this is
//! ASCII text — there is no binary encoding anywhere in the protocol.

use crate::error::{Error, Result};

pub const FIELD_DELIM: &str = "[]:[]";

/// The protocol version from which a 64-bit field is sent as a single
/// decimal rather than a signed 32-bit hi/lo pair.
pub const INT64_SINGLE_FIELD_VERSION: u32 = 66;

/// Split a raw message body into its `[]:[]`-delimited fields.
///
/// An empty body yields a single empty field, matching the C client's
/// `strtok`-based splitter (it never returns zero fields for a non-null
/// string).
pub fn split_fields(body: &str) -> Vec<&str> {
    if body.is_empty() {
        return vec![""];
    }
    body.split(FIELD_DELIM).collect()
}

/// Join fields back into a single `[]:[]`-delimited message body.
pub fn join_fields<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fields
        .into_iter()
        .map(|f| f.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(FIELD_DELIM)
}

/// Parse a single field as a signed 32-bit integer.
pub fn parse_i32(field: &str) -> Result<i32> {
    field
        .trim()
        .parse::<i32>()
        .map_err(|_| Error::Protocol(format!("expected i32 field, got {:?}", field)))
}

/// Parse a single field as an unsigned 32-bit integer.
pub fn parse_u32(field: &str) -> Result<u32> {
    field
        .trim()
        .parse::<u32>()
        .map_err(|_| Error::Protocol(format!("expected u32 field, got {:?}", field)))
}

/// Parse a single field as a signed 64-bit integer (the single-field form
/// used from protocol 66 onward).
pub fn parse_i64(field: &str) -> Result<i64> {
    field
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::Protocol(format!("expected i64 field, got {:?}", field)))
}

/// Reassemble a 64-bit value from a signed hi/lo pair of 32-bit fields, the
/// form used below protocol 66.
pub fn parse_i64_hilo(hi: &str, lo: &str) -> Result<i64> {
    let hi = parse_i32(hi)? as i64;
    let lo = parse_u32(lo)? as i64;
    Ok((hi << 32) | lo)
}

/// Encode a 64-bit value as either a single decimal field (protocol >= 66)
/// or a signed hi/lo pair (protocol < 66), appending to `out`.
pub fn encode_int64(out: &mut Vec<String>, value: i64, protocol_version: u32) {
    if protocol_version >= INT64_SINGLE_FIELD_VERSION {
        out.push(value.to_string());
    } else {
        let hi = (value >> 32) as i32;
        let lo = (value & 0xffff_ffff) as u32;
        out.push(hi.to_string());
        out.push(lo.to_string());
    }
}

/// Decode a 64-bit value from the given fields, honoring the version-gated
/// single/hi-lo encoding. Returns the value and the number of fields consumed.
pub fn decode_int64(fields: &[&str], protocol_version: u32) -> Result<(i64, usize)> {
    if protocol_version >= INT64_SINGLE_FIELD_VERSION {
        let field = fields.first().ok_or_else(|| Error::Protocol("missing int64 field".into()))?;
        Ok((parse_i64(field)?, 1))
    } else {
        if fields.len() < 2 {
            return Err(Error::Protocol("missing int64 hi/lo fields".into()));
        }
        Ok((parse_i64_hilo(fields[0], fields[1])?, 2))
    }
}

/// Outcome of a simple `OK`/`ERROR` style reply.
#[derive(Debug, Eq, PartialEq)]
pub enum Status {
    Ok,
    Error(String),
}

/// Parse a reply body that is either the literal string `OK` or carries an
/// error. Myth backends answer many control requests this way.
pub fn parse_status(body: &str) -> Status {
    let body = body.trim();
    if body == "OK" {
        Status::Ok
    } else {
        Status::Error(body.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_and_join_roundtrip() {
        let body = "QUERY_RECORDER[]:[]42[]:[]GET_FRAMERATE";
        let fields = split_fields(body);
        assert_eq!(fields, vec!["QUERY_RECORDER", "42", "GET_FRAMERATE"]);
        assert_eq!(join_fields(fields), body);
    }

    #[test]
    fn test_split_empty_body_yields_one_field() {
        assert_eq!(split_fields(""), vec![""]);
    }

    #[test]
    fn test_int64_single_field_roundtrip() {
        let mut fields = Vec::new();
        encode_int64(&mut fields, 123456789012345, 70);
        assert_eq!(fields.len(), 1);

        let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
        let (value, consumed) = decode_int64(&refs, 70).unwrap();
        assert_eq!(value, 123456789012345);
        assert_eq!(consumed, 1);
    }

    #[test]
    fn test_int64_hilo_roundtrip_matches_single_field_value() {
        let value: i64 = 123456789012345;

        let mut hilo_fields = Vec::new();
        encode_int64(&mut hilo_fields, value, 50);
        assert_eq!(hilo_fields.len(), 2);

        let refs: Vec<&str> = hilo_fields.iter().map(String::as_str).collect();
        let (decoded, consumed) = decode_int64(&refs, 50).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn test_negative_int64_hilo_roundtrip() {
        let value: i64 = -9876543210;

        let mut hilo_fields = Vec::new();
        encode_int64(&mut hilo_fields, value, 50);

        let refs: Vec<&str> = hilo_fields.iter().map(String::as_str).collect();
        let (decoded, _) = decode_int64(&refs, 50).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("OK"), Status::Ok);
        assert_eq!(parse_status("  OK  "), Status::Ok);
        assert_eq!(parse_status("ERROR"), Status::Error("ERROR".to_string()));
    }
}
