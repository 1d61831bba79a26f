use log::warn;
use std::cmp;
use std::error;
use std::fmt;
use std::io;

use crate::warning::DecodeWarning;
use crate::BoxType;

#[derive(Debug)]
pub enum ReaderError {
    /// The underlying stream ended before the requested bytes.
    TruncatedStream {
        offset: u64,
        requested: u64,
        available: u64,
    },

    /// The read would cross the end of the enclosing box.
    BoundsExceeded {
        offset: u64,
        requested: u64,
        remaining: u64,
    },

    Io(io::Error),
}

impl error::Error for ReaderError {}
impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::TruncatedStream {
                offset,
                requested,
                available,
            } => write!(
                f,
                "stream truncated at byte offset {}, {} bytes requested but {} available",
                offset, requested, available
            ),
            Self::BoundsExceeded {
                offset,
                requested,
                remaining,
            } => write!(
                f,
                "read of {} bytes at byte offset {} exceeds box bounds, {} bytes remaining",
                requested, offset, remaining
            ),
            Self::Io(error) => write!(f, "{}", error),
        }
    }
}

impl From<io::Error> for ReaderError {
    fn from(error: io::Error) -> ReaderError {
        ReaderError::Io(error)
    }
}

/// Big endian reader over a byte region of a seekable stream.
///
/// The top level reader covers everything from the stream position it was
/// created at to the end of the stream. `bounded` hands out a reader for a
/// sub-region, which is how a box payload is decoded without reading into
/// its siblings. Positions are always absolute stream offsets.
pub struct BoxReader<'a, R> {
    inner: &'a mut R,
    warnings: &'a mut Vec<DecodeWarning>,
    start: u64,
    position: u64,
    end: u64,

    // Region runs to the end of the underlying stream.
    open_end: bool,

    // Short reads are truncations rather than box overruns.
    top_level: bool,
}

impl<'a, R: io::Read + io::Seek> BoxReader<'a, R> {
    pub fn new(
        inner: &'a mut R,
        warnings: &'a mut Vec<DecodeWarning>,
    ) -> Result<BoxReader<'a, R>, ReaderError> {
        let position = inner.stream_position()?;
        let end = inner.seek(io::SeekFrom::End(0))?;
        inner.seek(io::SeekFrom::Start(position))?;

        Ok(BoxReader {
            inner,
            warnings,
            start: position,
            position,
            end: cmp::max(end, position),
            open_end: true,
            top_level: true,
        })
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn remaining(&self) -> u64 {
        self.end.saturating_sub(self.position)
    }

    /// True when this region extends to the end of the underlying stream.
    pub fn is_open_ended(&self) -> bool {
        self.open_end
    }

    /// Reader over the next `length` bytes.
    pub fn bounded(&mut self, length: u64) -> Result<BoxReader<'_, R>, ReaderError> {
        if length > self.remaining() {
            return Err(self.overrun(length));
        }

        Ok(BoxReader {
            inner: &mut *self.inner,
            warnings: &mut *self.warnings,
            start: self.position,
            position: self.position,
            end: self.position + length,
            open_end: false,
            top_level: false,
        })
    }

    /// Reader over everything that is left, keeping the open end.
    pub fn rest(&mut self) -> BoxReader<'_, R> {
        BoxReader {
            inner: &mut *self.inner,
            warnings: &mut *self.warnings,
            start: self.position,
            position: self.position,
            end: self.end,
            open_end: self.open_end,
            top_level: false,
        }
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ReaderError> {
        let requested = buf.len() as u64;
        if requested > self.remaining() {
            return Err(self.overrun(requested));
        }

        if let Err(error) = self.inner.read_exact(buf) {
            if error.kind() == io::ErrorKind::UnexpectedEof {
                return Err(ReaderError::TruncatedStream {
                    offset: self.position,
                    requested,
                    available: 0,
                });
            }
            return Err(error.into());
        }
        self.position += requested;

        Ok(())
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ReaderError> {
        let mut buf = [0; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReaderError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ReaderError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, ReaderError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, ReaderError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    /// Unsigned big endian integer stored in `size` bytes (at most 8).
    pub fn read_uint(&mut self, size: usize) -> Result<u64, ReaderError> {
        let mut buf = [0u8; 8];
        let size = cmp::min(size, buf.len());
        self.read_exact(&mut buf[8 - size..])?;
        Ok(u64::from_be_bytes(buf))
    }

    pub fn read_bytes(&mut self, length: u64) -> Result<Vec<u8>, ReaderError> {
        if length > self.remaining() {
            return Err(self.overrun(length));
        }
        let mut buf = vec![0; length as usize];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_to_end(&mut self) -> Result<Vec<u8>, ReaderError> {
        self.read_bytes(self.remaining())
    }

    pub fn seek_to(&mut self, position: u64) -> Result<(), ReaderError> {
        self.inner.seek(io::SeekFrom::Start(position))?;
        self.position = position;
        Ok(())
    }

    /// Record a decode warning and log it.
    pub fn warn(&mut self, offset: u64, box_type: Option<BoxType>, message: String) {
        let warning = DecodeWarning::new(offset, box_type, message);
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub(crate) fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    // Drops warnings recorded by an abandoned decode attempt.
    pub(crate) fn truncate_warnings(&mut self, count: usize) {
        self.warnings.truncate(count);
    }

    fn overrun(&self, requested: u64) -> ReaderError {
        if self.top_level {
            ReaderError::TruncatedStream {
                offset: self.position,
                requested,
                available: self.remaining(),
            }
        } else {
            ReaderError::BoundsExceeded {
                offset: self.position,
                requested,
                remaining: self.remaining(),
            }
        }
    }
}

impl<'a, R: io::Read + io::Seek> io::Read for BoxReader<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let limit = cmp::min(buf.len() as u64, self.remaining()) as usize;
        if limit == 0 {
            return Ok(0);
        }
        let read = self.inner.read(&mut buf[..limit])?;
        self.position += read as u64;
        Ok(read)
    }
}

impl<'a, R: io::Read + io::Seek> io::Seek for BoxReader<'a, R> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let target = match pos {
            io::SeekFrom::Start(position) => Some(position),
            io::SeekFrom::End(delta) => offset_by(self.end, delta),
            io::SeekFrom::Current(delta) => offset_by(self.position, delta),
        };

        match target {
            Some(position) if position >= self.start => {
                self.inner.seek(io::SeekFrom::Start(position))?;
                self.position = position;
                Ok(position)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before the start of the box",
            )),
        }
    }
}

fn offset_by(base: u64, delta: i64) -> Option<u64> {
    if delta >= 0 {
        base.checked_add(delta as u64)
    } else {
        base.checked_sub(delta.unsigned_abs())
    }
}

/// Big endian writer that keeps track of how many bytes went out.
pub struct BoxWriter<W> {
    inner: W,
    position: u64,
    open_end: bool,
}

impl<W: io::Write> BoxWriter<W> {
    pub fn new(inner: W) -> BoxWriter<W> {
        BoxWriter {
            inner,
            position: 0,
            open_end: true,
        }
    }

    // Writer for a payload; `open_end` is set when the enclosing box is
    // written with length 0 and so may end in a length 0 child.
    pub(crate) fn payload(inner: W, open_end: bool) -> BoxWriter<W> {
        BoxWriter {
            inner,
            position: 0,
            open_end,
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn is_open_ended(&self) -> bool {
        self.open_end
    }

    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<(), io::Error> {
        self.inner.write_all(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), io::Error> {
        self.write_bytes(&[value])
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), io::Error> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), io::Error> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<(), io::Error> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Low `size` bytes of `value`, big endian.
    pub fn write_uint(&mut self, value: u64, size: usize) -> Result<(), io::Error> {
        let bytes = value.to_be_bytes();
        let size = cmp::min(size, bytes.len());
        self.write_bytes(&bytes[bytes.len() - size..])
    }

    pub fn flush(&mut self) -> Result<(), io::Error> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read, Seek};

    #[test]
    fn reads_big_endian() {
        let mut cursor = Cursor::new(vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07]);
        let mut warnings = vec![];
        let mut reader = BoxReader::new(&mut cursor, &mut warnings).unwrap();

        assert_eq!(reader.read_u16().unwrap(), 0x0102);
        assert_eq!(reader.read_uint(3).unwrap(), 0x030405);
        assert_eq!(reader.remaining(), 2);
        assert_eq!(reader.position(), 5);
    }

    #[test]
    fn truncated_at_top_level() {
        let mut cursor = Cursor::new(vec![0x01, 0x02]);
        let mut warnings = vec![];
        let mut reader = BoxReader::new(&mut cursor, &mut warnings).unwrap();

        match reader.read_u32() {
            Err(ReaderError::TruncatedStream {
                requested,
                available,
                ..
            }) => {
                assert_eq!(requested, 4);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn bounded_region() {
        let mut cursor = Cursor::new(vec![0xAA; 16]);
        let mut warnings = vec![];
        let mut reader = BoxReader::new(&mut cursor, &mut warnings).unwrap();
        reader.read_u32().unwrap();

        let mut region = reader.bounded(6).unwrap();
        assert_eq!(region.read_u32().unwrap(), 0xAAAA_AAAA);
        match region.read_u32() {
            Err(ReaderError::BoundsExceeded {
                offset, remaining, ..
            }) => {
                assert_eq!(offset, 8);
                assert_eq!(remaining, 2);
            }
            other => panic!("unexpected result {:?}", other),
        }

        // io::Read stops at the end of the region
        let mut rest = vec![];
        Read::read_to_end(&mut region, &mut rest).unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(region.stream_position().unwrap(), 10);

        assert!(reader.bounded(13).is_err());
    }

    #[test]
    fn writes_big_endian() {
        let mut writer = BoxWriter::new(vec![]);
        writer.write_u16(0x0102).unwrap();
        writer.write_uint(0x0A0B0C, 3).unwrap();
        writer.write_u32(7).unwrap();
        assert_eq!(writer.position(), 9);
        assert_eq!(
            writer.into_inner(),
            vec![0x01, 0x02, 0x0A, 0x0B, 0x0C, 0, 0, 0, 7]
        );
    }
}
