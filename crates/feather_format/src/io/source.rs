//! Position addressed reads of already written data.
use bytes::Bytes;
use feather_error::{ErrorKind, FeatherError, Result};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::physical::{decode_le, FixedWidthType};

/// Random access reads over some byte range (a file, a memory map, a buffer).
pub trait ByteRangeSource: Debug {
    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read exactly `len` bytes starting at `start`.
    fn read_at(&self, start: u64, len: usize) -> Result<Bytes>;
}

fn out_of_bounds(start: u64, len: usize, total: u64) -> FeatherError {
    FeatherError::with_kind(
        ErrorKind::Io,
        format!("Read of {len} bytes at {start} is out of bounds for length {total}"),
    )
}

fn check_range(start: u64, len: usize, total: u64) -> Result<std::ops::Range<usize>> {
    let end = start
        .checked_add(len as u64)
        .filter(|end| *end <= total)
        .ok_or_else(|| out_of_bounds(start, len, total))?;
    Ok(usize::try_from(start)?..usize::try_from(end)?)
}

impl ByteRangeSource for Bytes {
    fn len(&self) -> u64 {
        Bytes::len(self) as u64
    }

    fn read_at(&self, start: u64, len: usize) -> Result<Bytes> {
        let range = check_range(start, len, ByteRangeSource::len(self))?;
        Ok(self.slice(range))
    }
}

impl ByteRangeSource for [u8] {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn read_at(&self, start: u64, len: usize) -> Result<Bytes> {
        let range = check_range(start, len, ByteRangeSource::len(self))?;
        Ok(Bytes::copy_from_slice(&self[range]))
    }
}

impl ByteRangeSource for Vec<u8> {
    fn len(&self) -> u64 {
        Vec::len(self) as u64
    }

    fn read_at(&self, start: u64, len: usize) -> Result<Bytes> {
        self.as_slice().read_at(start, len)
    }
}

/// Reads from a file through its shared cursor.
#[derive(Debug)]
pub struct FileSource {
    file: Mutex<File>,
    len: u64,
}

impl FileSource {
    pub fn new(file: File) -> Result<Self> {
        let len = file.metadata()?.len();
        Ok(FileSource {
            file: Mutex::new(file),
            len,
        })
    }
}

impl ByteRangeSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, start: u64, len: usize) -> Result<Bytes> {
        check_range(start, len, self.len)?;
        let mut buf = vec![0; len];
        let mut file = self.file.lock();
        read_at_sync(&mut *file, start, &mut buf)?;
        Ok(Bytes::from(buf))
    }
}

/// Helper for synchronously reading into a buffer.
fn read_at_sync<R>(mut reader: R, start: u64, buf: &mut [u8]) -> Result<()>
where
    R: Read + Seek,
{
    reader.seek(SeekFrom::Start(start))?;
    reader.read_exact(buf)?;
    Ok(())
}

/// Read `count` little endian values starting at `start`.
pub fn read_array<T, R>(source: &R, start: u64, count: usize) -> Result<Vec<T>>
where
    T: FixedWidthType,
    R: ByteRangeSource + ?Sized,
{
    let len = count
        .checked_mul(T::width())
        .ok_or_else(|| out_of_bounds(start, usize::MAX, source.len()))?;
    let bytes = source.read_at(start, len)?;
    Ok(decode_le(&bytes))
}
