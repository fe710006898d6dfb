use slice_deque::SliceDeque;
use std::io;

type ByteDeque = SliceDeque<u8>;

/// A growable, double-ended FIFO byte queue used to accumulate a single
/// framed reply. Data is appended at the tail and drained from the head.
///
/// Unlike a fixed-capacity ring buffer, a `Buffer` grows to fit whatever
/// frame length the backend announced; the transport is responsible for
/// rejecting lengths it considers unreasonable before allocating.
pub struct Buffer {
    data: ByteDeque,
}

impl Buffer {
    #[inline]
    pub fn new() -> Buffer {
        Buffer { data: ByteDeque::new() }
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Buffer {
        let mut data = ByteDeque::new();
        data.reserve(capacity);
        Buffer { data }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        unsafe { self.data.move_head(self.len() as isize) };
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Read exactly `want` bytes from `reader`, growing the buffer as needed.
    /// Blocks (subject to the reader's own timeout) until `want` bytes have
    /// been read or an error occurs.
    pub fn fill_exact<R: io::Read>(&mut self, mut reader: R, want: usize) -> io::Result<()> {
        self.clear();
        self.data.reserve(want);

        let mut remaining = want;
        while remaining > 0 {
            let chunk = unsafe { self.data.tail_head_slice() };
            let chunk = &mut chunk[..remaining.min(chunk.len())];
            let read_count = reader.read(chunk)?;

            if read_count == 0 {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }

            unsafe { self.data.move_tail(read_count as isize) };
            remaining -= read_count;
        }

        Ok(())
    }

    /// Write the full contents of the buffer to `writer`.
    pub fn drain_to<W: io::Write>(&mut self, mut writer: W) -> io::Result<usize> {
        let orig_len = self.data.len();

        while !self.data.is_empty() {
            let write_count = writer.write(&self.data)?;

            if write_count == 0 {
                return Err(io::ErrorKind::WriteZero.into());
            }

            unsafe { self.data.move_head(write_count as isize) };
        }

        Ok(orig_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::min;

    struct MockChannel {
        data: Vec<u8>,
        cursor: usize,
        chunk: usize,
    }

    impl MockChannel {
        fn new(data: Vec<u8>, chunk: usize) -> MockChannel {
            MockChannel { data, cursor: 0, chunk }
        }
    }

    impl io::Read for MockChannel {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.cursor == self.data.len() {
                return Ok(0);
            }

            let offset = min(min(self.chunk, buf.len()), self.data.len() - self.cursor);
            buf[..offset].copy_from_slice(&self.data[self.cursor..(self.cursor + offset)]);
            self.cursor += offset;
            Ok(offset)
        }
    }

    #[test]
    fn test_fill_exact_assembles_chunked_reads() {
        let payload = b"00000042OK[]:[]42".to_vec();
        let mut channel = MockChannel::new(payload.clone(), 5);

        let mut buffer = Buffer::new();
        buffer.fill_exact(&mut channel, payload.len()).unwrap();

        assert_eq!(buffer.as_slice(), &payload[..]);
    }

    #[test]
    fn test_fill_exact_eof_is_an_error() {
        let mut channel = MockChannel::new(b"short".to_vec(), 5);
        let mut buffer = Buffer::new();

        let result = buffer.fill_exact(&mut channel, 100);

        assert!(result.is_err());
        assert_eq!(result.err().unwrap().kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_drain_to_writes_everything() {
        let mut buffer = Buffer::new();
        buffer.fill_exact(&[1u8, 2, 3][..], 3).unwrap();

        let mut out = Vec::new();
        let written = buffer.drain_to(&mut out).unwrap();

        assert_eq!(written, 3);
        assert_eq!(out, vec![1, 2, 3]);
        assert!(buffer.is_empty());
    }
}
