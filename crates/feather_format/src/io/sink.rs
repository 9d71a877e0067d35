//! Physical sinks the multiplexer commits bytes to.
use feather_error::{FeatherError, Result};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Forward-moving byte destination.
///
/// The multiplexer only ever asks a sink to move to an offset and write from
/// there, so sinks that can't seek are usable as long as they can move
/// forward by some other means.
pub trait PhysicalSink {
    /// Current absolute position.
    fn position(&self) -> u64;

    /// Move to `offset` before the next write.
    fn advance_to(&mut self, offset: u64) -> Result<()>;

    fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    fn flush(&mut self) -> Result<()>;
}

/// Sink over a seekable writer. May move backwards.
#[derive(Debug)]
pub struct SeekableSink<W> {
    inner: W,
    position: u64,
}

impl<W: Write + Seek> SeekableSink<W> {
    pub fn new(mut inner: W) -> Result<Self> {
        let position = inner.stream_position()?;
        Ok(SeekableSink { inner, position })
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Seek> PhysicalSink for SeekableSink<W> {
    fn position(&self) -> u64 {
        self.position
    }

    fn advance_to(&mut self, offset: u64) -> Result<()> {
        if offset != self.position {
            self.position = self.inner.seek(SeekFrom::Start(offset))?;
        }
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

fn backward(position: u64, offset: u64) -> FeatherError {
    FeatherError::backward_seek(format!(
        "Sink at position {position} cannot move back to {offset}"
    ))
}

fn write_zeros<W: Write>(writer: &mut W, count: u64) -> Result<()> {
    let written = io::copy(&mut io::repeat(0).take(count), writer)?;
    if written != count {
        return Err(FeatherError::new(format!(
            "Short zero fill, wrote {written} of {count} bytes"
        )));
    }
    Ok(())
}

/// Sink over a plain writer, moving forward by writing zeros.
#[derive(Debug)]
pub struct PaddingSink<W> {
    inner: W,
    position: u64,
}

impl<W: Write> PaddingSink<W> {
    /// Create a sink whose writer is currently at `position`.
    pub fn new(inner: W, position: u64) -> Self {
        PaddingSink { inner, position }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> PhysicalSink for PaddingSink<W> {
    fn position(&self) -> u64 {
        self.position
    }

    fn advance_to(&mut self, offset: u64) -> Result<()> {
        if offset < self.position {
            return Err(backward(self.position, offset));
        }
        write_zeros(&mut self.inner, offset - self.position)?;
        self.position = offset;
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Sink over a readable and writable stream sharing one cursor.
///
/// Moves forward by reading and discarding existing bytes. Once the end of
/// the stream is reached the rest of the gap is zero filled.
#[derive(Debug)]
pub struct DiscardingSink<S> {
    inner: S,
    position: u64,
}

impl<S: Read + Write> DiscardingSink<S> {
    pub fn new(inner: S, position: u64) -> Self {
        DiscardingSink { inner, position }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Read + Write> PhysicalSink for DiscardingSink<S> {
    fn position(&self) -> u64 {
        self.position
    }

    fn advance_to(&mut self, offset: u64) -> Result<()> {
        if offset < self.position {
            return Err(backward(self.position, offset));
        }

        let gap = offset - self.position;
        let discarded = io::copy(&mut (&mut self.inner).take(gap), &mut io::sink())?;
        write_zeros(&mut self.inner, gap - discarded)?;
        self.position = offset;

        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use feather_error::ErrorKind;
    use std::io::Cursor;

    use super::*;

    #[test]
    fn seekable_moves_both_ways() {
        let mut sink = SeekableSink::new(Cursor::new(Vec::new())).unwrap();
        sink.advance_to(4).unwrap();
        sink.write_all(b"ab").unwrap();
        sink.advance_to(0).unwrap();
        sink.write_all(b"xy").unwrap();
        assert_eq!(2, sink.position());

        assert_eq!(b"xy\0\0ab", sink.into_inner().into_inner().as_slice());
    }

    #[test]
    fn padding_fills_gaps() {
        let mut sink = PaddingSink::new(Vec::new(), 0);
        sink.write_all(b"a").unwrap();
        sink.advance_to(3).unwrap();
        sink.write_all(b"b").unwrap();
        sink.advance_to(4).unwrap();
        assert_eq!(4, sink.position());

        let err = sink.advance_to(2).unwrap_err();
        assert_eq!(ErrorKind::BackwardSeek, err.kind());

        assert_eq!(b"a\0\0b", sink.into_inner().as_slice());
    }

    #[test]
    fn discarding_keeps_existing_bytes() {
        let existing = Cursor::new(b"0123".to_vec());
        let mut sink = DiscardingSink::new(existing, 0);

        sink.advance_to(1).unwrap();
        sink.write_all(b"x").unwrap();
        // Two existing bytes, two past the end.
        sink.advance_to(6).unwrap();
        sink.write_all(b"y").unwrap();

        assert_eq!(7, sink.position());
        assert_eq!(b"0x23\0\0y", sink.into_inner().into_inner().as_slice());
    }
}
