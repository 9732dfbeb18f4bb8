//! Seekable reader over a byte-range source with a read-ahead window.
//!
//! Zip archives are read from the end (central directory) before any entry is
//! touched, so remote archives are exposed as `Read + Seek` and only the
//! windows the archive reader actually visits are fetched.

use std::io::{self, Read, Seek, SeekFrom};

/// Bytes fetched per range request.
pub const READ_AHEAD: usize = 1024 * 1024;

/// Random-access byte source of known length.
#[cfg_attr(test, mockall::automock)]
pub trait RangeSource {
    /// Total length in bytes.
    fn len(&self) -> u64;

    /// Reads up to `length` bytes starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying transport fails.
    fn read_range(&self, start: u64, length: usize) -> io::Result<Vec<u8>>;
}

/// Buffers one window of a [`RangeSource`] at a time.
#[derive(Debug)]
pub struct RangeReader<S> {
    source: S,
    position: u64,
    window_start: u64,
    window: Vec<u8>,
    window_size: usize,
}

impl<S: RangeSource> RangeReader<S> {
    /// Wraps `source` with the default [`READ_AHEAD`] window.
    pub fn new(source: S) -> Self {
        Self::with_window(source, READ_AHEAD)
    }

    /// Wraps `source` with a custom window size (at least one byte).
    pub fn with_window(source: S, window_size: usize) -> Self {
        Self {
            source,
            position: 0,
            window_start: 0,
            window: Vec::new(),
            window_size: window_size.max(1),
        }
    }

    fn window_offset(&self) -> Option<usize> {
        let offset = self.position.checked_sub(self.window_start)?;
        let offset = usize::try_from(offset).ok()?;
        (offset < self.window.len()).then_some(offset)
    }

    fn fill(&mut self) -> io::Result<()> {
        let remaining = self.source.len().saturating_sub(self.position);
        let length = usize::try_from(remaining)
            .unwrap_or(usize::MAX)
            .min(self.window_size);
        let bytes = self.source.read_range(self.position, length)?;
        if bytes.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("range source returned no bytes at offset {}", self.position),
            ));
        }
        self.window_start = self.position;
        self.window = bytes;
        Ok(())
    }
}

impl<S: RangeSource> Read for RangeReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.position >= self.source.len() {
            return Ok(0);
        }
        let offset = match self.window_offset() {
            Some(offset) => offset,
            None => {
                self.fill()?;
                0
            }
        };
        let available = self.window.get(offset..).unwrap_or_default();
        let count = available.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(available) {
            *slot = *byte;
        }
        self.position += count as u64;
        Ok(count)
    }
}

impl<S: RangeSource> Seek for RangeReader<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.source.len().checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )
        })?;
        self.position = target;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use mockall::predicate::eq;
    use rstest::rstest;

    use super::*;

    struct SliceSource {
        bytes: Vec<u8>,
        requests: RefCell<Vec<(u64, usize)>>,
    }

    impl SliceSource {
        fn new(len: u8) -> Self {
            Self {
                bytes: (0..len).collect(),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl RangeSource for &SliceSource {
        fn len(&self) -> u64 {
            self.bytes.len() as u64
        }

        fn read_range(&self, start: u64, length: usize) -> io::Result<Vec<u8>> {
            self.requests.borrow_mut().push((start, length));
            let start = usize::try_from(start).expect("offset fits");
            let end = (start + length).min(self.bytes.len());
            Ok(self.bytes[start..end].to_vec())
        }
    }

    #[test]
    fn reads_across_window_boundaries() {
        let source = SliceSource::new(10);
        let mut reader = RangeReader::with_window(&source, 4);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).expect("read");

        assert_eq!(out, (0..10).collect::<Vec<u8>>());
        assert_eq!(*source.requests.borrow(), vec![(0, 4), (4, 4), (8, 2)]);
    }

    #[test]
    fn reads_within_a_window_reuse_the_buffer() {
        let source = SliceSource::new(10);
        let mut reader = RangeReader::with_window(&source, 8);
        let mut first = [0u8; 2];
        let mut second = [0u8; 2];
        reader.read_exact(&mut first).expect("first");
        reader.seek(SeekFrom::Start(5)).expect("seek");
        reader.read_exact(&mut second).expect("second");

        assert_eq!(first, [0, 1]);
        assert_eq!(second, [5, 6]);
        assert_eq!(source.requests.borrow().len(), 1);
    }

    #[rstest]
    #[case(SeekFrom::End(-3), 7)]
    #[case(SeekFrom::Start(2), 2)]
    #[case(SeekFrom::Current(4), 4)]
    fn seeks_relative_to_each_origin(#[case] pos: SeekFrom, #[case] expected: u8) {
        let source = SliceSource::new(10);
        let mut reader = RangeReader::with_window(&source, 4);
        reader.seek(pos).expect("seek");
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte).expect("read");
        assert_eq!(byte[0], expected);
    }

    #[test]
    fn negative_seek_is_rejected() {
        let source = SliceSource::new(4);
        let mut reader = RangeReader::new(&source);
        let error = reader.seek(SeekFrom::Current(-1)).expect_err("must fail");
        assert_eq!(error.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn reading_past_the_end_yields_nothing() {
        let source = SliceSource::new(4);
        let mut reader = RangeReader::new(&source);
        reader.seek(SeekFrom::Start(10)).expect("seek");
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).expect("read"), 0);
        assert!(source.requests.borrow().is_empty());
    }

    #[test]
    fn empty_range_response_is_an_error() {
        let mut source = MockRangeSource::new();
        source.expect_len().return_const(8_u64);
        source
            .expect_read_range()
            .with(eq(0_u64), eq(8_usize))
            .returning(|_, _| Ok(Vec::new()));
        let mut reader = RangeReader::with_window(source, 16);
        let mut buf = [0u8; 4];
        let error = reader.read(&mut buf).expect_err("must fail");
        assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof);
    }
}
