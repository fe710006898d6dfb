//! Myth protocol timestamps are ISO-8601-ish strings (`YYYY-MM-DDTHH:MM:SS`,
//! UTC, no offset) embedded as ordinary fields. A handful of older fields
//! instead carry a plain decimal unix epoch; both forms are accepted on
//! parse, matching what real backends have sent across protocol revisions.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse a timestamp field in either the `YYYY-MM-DDTHH:MM:SS` form or as a
/// raw decimal unix epoch.
pub fn parse(field: &str) -> Result<DateTime<Utc>> {
    let field = field.trim();

    if let Ok(naive) = NaiveDateTime::parse_from_str(field, DATETIME_FORMAT) {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(epoch) = field.parse::<i64>() {
        return Ok(Utc.timestamp(epoch, 0));
    }

    Err(Error::Protocol(format!("malformed timestamp field: {:?}", field)))
}

/// Render a timestamp the way the backend expects it on the wire.
pub fn format(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(DATETIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_form() {
        let ts = parse("2024-03-05T20:00:00").unwrap();
        assert_eq!(format(&ts), "2024-03-05T20:00:00");
    }

    #[test]
    fn test_parse_epoch_form() {
        let ts = parse("1709668800").unwrap();
        assert_eq!(ts.timestamp(), 1709668800);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("not-a-timestamp").is_err());
    }
}
