//! Length-prefixed framing used on every myth protocol socket (control,
//! event, file-transfer and ring-buffer connections alike): each message is
//! preceded by an 8-byte ASCII decimal giving the length, in bytes, of the
//! message body that follows. There is no binary header anywhere on the
//! wire — everything, including the length, is plain text.

use crate::error::{Error, Result};
use std::io::{self, Read, Write};

pub const LENGTH_HEADER_SIZE: usize = 8;

/// Read and parse an 8-byte ASCII length header, e.g. `b"42      "`.
pub fn read_length_header<R: Read>(mut reader: R) -> Result<usize> {
    let mut header = [0u8; LENGTH_HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let text = std::str::from_utf8(&header)
        .map_err(|_| Error::Protocol("length header is not valid utf-8".into()))?;

    text.trim()
        .parse::<usize>()
        .map_err(|_| Error::Protocol(format!("malformed length header: {:?}", text)))
}

/// Write an 8-byte ASCII length header, left-justified with trailing spaces
/// — `sprintf("%-8d", len)`.
pub fn write_length_header<W: Write>(mut writer: W, len: usize) -> io::Result<()> {
    let text = format!("{:<8}", len);
    debug_assert_eq!(text.len(), LENGTH_HEADER_SIZE, "message too long for header");
    writer.write_all(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_header_roundtrip() {
        let mut buf = Vec::new();
        write_length_header(&mut buf, 42).unwrap();
        assert_eq!(buf, b"42      ");

        let len = read_length_header(&buf[..]).unwrap();
        assert_eq!(len, 42);
    }

    #[test]
    fn test_length_header_rejects_garbage() {
        let err = read_length_header(&b"GARBAGE!"[..]).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_length_header_zero() {
        let mut buf = Vec::new();
        write_length_header(&mut buf, 0).unwrap();
        assert_eq!(read_length_header(&buf[..]).unwrap(), 0);
    }
}
