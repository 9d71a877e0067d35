//! Multiplexing several logical write streams onto one physical sink.
//!
//! Each child stream writes at absolute offsets. Writes are buffered and only
//! committed to the sink during a barrier flush, which happens once every
//! open child has requested a flush (or when the last child is removed).
//! During a barrier flush all buffered writes are committed in ascending
//! offset order, regardless of which child produced them or when.
use feather_error::{FeatherError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Seek, SeekFrom, Write};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::io::pool::BufferPool;
use crate::io::sink::PhysicalSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiplexerConfig {
    /// Number of reusable write buffers.
    pub pool_slots: usize,
    /// Minimum capacity of newly allocated write buffers.
    pub min_buffer_capacity: usize,
}

impl Default for MultiplexerConfig {
    fn default() -> Self {
        MultiplexerConfig {
            pool_slots: 8,
            min_buffer_capacity: 4096,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChildId(u64);

impl fmt::Display for ChildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "child-{}", self.0)
    }
}

/// Bytes waiting for the next barrier flush.
#[derive(Debug)]
pub struct PendingWrite {
    pub offset: u64,
    pub buf: Vec<u8>,
    pub len: usize,
}

#[derive(Debug)]
struct ChildState {
    position: u64,
    flush_requested: bool,
}

#[derive(Debug)]
struct MultiplexState<S> {
    sink: S,
    children: HashMap<ChildId, ChildState>,
    pending: Vec<PendingWrite>,
    next_id: u64,
}

impl<S: PhysicalSink> MultiplexState<S> {
    fn all_ready(&self) -> bool {
        self.children.values().all(|c| c.flush_requested)
    }

    fn child_mut(&mut self, id: ChildId) -> Result<&mut ChildState> {
        self.children
            .get_mut(&id)
            .ok_or_else(|| FeatherError::new(format!("{id} has already been removed")))
    }
}

#[derive(Debug)]
pub struct StreamMultiplexer<S> {
    state: Mutex<MultiplexState<S>>,
    pool: BufferPool,
}

impl<S: PhysicalSink> StreamMultiplexer<S> {
    pub fn new(sink: S, config: MultiplexerConfig) -> Self {
        StreamMultiplexer {
            state: Mutex::new(MultiplexState {
                sink,
                children: HashMap::new(),
                pending: Vec::new(),
                next_id: 0,
            }),
            pool: BufferPool::new(config.pool_slots, config.min_buffer_capacity),
        }
    }

    /// Create a new child stream.
    ///
    /// The child starts at the lowest position of any existing child, or 0 if
    /// there are none.
    pub fn create_child(self: &Arc<Self>) -> ChildStream<S> {
        let mut state = self.state.lock();
        let position = state
            .children
            .values()
            .map(|c| c.position)
            .min()
            .unwrap_or(0);

        let id = ChildId(state.next_id);
        state.next_id += 1;
        state.children.insert(
            id,
            ChildState {
                position,
                flush_requested: false,
            },
        );
        debug!(%id, %position, "created child stream");

        ChildStream {
            id,
            mux: self.clone(),
            position,
            closed: false,
        }
    }

    /// Remove a child.
    ///
    /// Completes a barrier if every remaining child already requested a
    /// flush. Removing the last child always flushes.
    pub fn remove_child(&self, id: ChildId) -> Result<()> {
        let mut state = self.state.lock();
        if state.children.remove(&id).is_none() {
            // Ids are handed out in order, anything below `next_id` existed.
            if id.0 < state.next_id {
                return Err(FeatherError::double_disposal(format!(
                    "{id} has already been removed"
                )));
            }
            return Err(FeatherError::double_disposal(format!("Unknown {id}")));
        }
        debug!(%id, remaining = state.children.len(), "removed child stream");

        if state.all_ready() {
            // Vacuously true when no children remain.
            self.flush_pending(&mut state)?;
        }

        Ok(())
    }

    /// Number of children not yet removed.
    pub fn child_count(&self) -> usize {
        self.state.lock().children.len()
    }

    /// Number of writes waiting for a barrier.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Run a function against the physical sink.
    pub fn with_sink<T>(&self, f: impl FnOnce(&S) -> T) -> T {
        f(&self.state.lock().sink)
    }

    /// Take back the physical sink. Unflushed writes are dropped.
    pub fn into_sink(self) -> S {
        self.state.into_inner().sink
    }

    fn push_write(&self, id: ChildId, offset: u64, bytes: &[u8]) -> Result<()> {
        let mut buf = self.pool.checkout(bytes.len());
        buf.extend_from_slice(bytes);

        let mut state = self.state.lock();
        let child = match state.child_mut(id) {
            Ok(child) => child,
            Err(e) => {
                self.pool.give_back(buf);
                return Err(e);
            }
        };
        child.position = offset + bytes.len() as u64;

        state.pending.push(PendingWrite {
            offset,
            buf,
            len: bytes.len(),
        });

        Ok(())
    }

    fn set_position(&self, id: ChildId, position: u64) -> Result<()> {
        self.state.lock().child_mut(id)?.position = position;
        Ok(())
    }

    fn request_flush(&self, id: ChildId) -> Result<()> {
        let mut state = self.state.lock();
        state.child_mut(id)?.flush_requested = true;
        trace!(%id, "child requested flush");

        if state.all_ready() {
            self.flush_pending(&mut state)?;
        }

        Ok(())
    }

    /// Commit all pending writes in offset order.
    ///
    /// The barrier ends even if committing fails. Writes after the failing
    /// one are discarded.
    fn flush_pending(&self, state: &mut MultiplexState<S>) -> Result<()> {
        let mut pending = std::mem::take(&mut state.pending);
        // Stable, writes to the same offset keep their arrival order.
        pending.sort_by_key(|w| w.offset);

        for child in state.children.values_mut() {
            child.flush_requested = false;
        }

        let entries = pending.len();
        let mut bytes = 0;
        let mut failed = None;
        let mut discarded = 0;
        for write in pending {
            if failed.is_some() {
                discarded += 1;
            } else {
                match commit(&mut state.sink, &write) {
                    Ok(()) => bytes += write.len,
                    Err(e) => failed = Some(e),
                }
            }
            self.pool.give_back(write.buf);
        }
        if let Some(e) = failed {
            warn!(%e, discarded, "barrier flush failed");
            return Err(e);
        }
        state.sink.flush()?;

        debug!(
            entries,
            bytes,
            position = state.sink.position(),
            "barrier flush"
        );

        Ok(())
    }
}

fn commit<S: PhysicalSink>(sink: &mut S, write: &PendingWrite) -> Result<()> {
    sink.advance_to(write.offset)?;
    sink.write_all(&write.buf[..write.len])
}

/// A logical stream writing through a multiplexer.
///
/// Positions only move forward. Dropping a stream without closing it removes
/// it from the multiplexer.
#[derive(Debug)]
pub struct ChildStream<S: PhysicalSink> {
    id: ChildId,
    mux: Arc<StreamMultiplexer<S>>,
    position: u64,
    closed: bool,
}

impl<S: PhysicalSink> ChildStream<S> {
    pub fn id(&self) -> ChildId {
        self.id
    }

    /// Absolute position the next write lands at.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Write at the current position.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_at(self.position, bytes)
    }

    /// Write at an absolute offset at or after the current position.
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        if offset < self.position {
            return Err(FeatherError::backward_seek(format!(
                "{} cannot write at {offset}, already at {}",
                self.id, self.position
            )));
        }

        if bytes.is_empty() {
            return self.seek_to(offset);
        }

        self.mux.push_write(self.id, offset, bytes)?;
        self.position = offset + bytes.len() as u64;

        Ok(())
    }

    /// Move forward without writing.
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        if offset < self.position {
            return Err(FeatherError::backward_seek(format!(
                "{} cannot seek to {offset}, already at {}",
                self.id, self.position
            )));
        }

        self.mux.set_position(self.id, offset)?;
        self.position = offset;

        Ok(())
    }

    /// Opt into the next barrier flush.
    ///
    /// The stream may keep writing afterwards. Those writes are committed by
    /// whichever barrier runs next.
    pub fn request_flush(&mut self) -> Result<()> {
        self.mux.request_flush(self.id)
    }

    /// Remove this stream from the multiplexer.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.mux.remove_child(self.id)
    }
}

impl<S: PhysicalSink> Drop for ChildStream<S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        match self.mux.remove_child(self.id) {
            Ok(()) => debug!(id = %self.id, "removed unclosed child stream on drop"),
            Err(e) => warn!(id = %self.id, %e, "failed to remove child stream on drop"),
        }
    }
}

impl<S: PhysicalSink> Write for ChildStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    /// No-op, bytes are only committed by barrier flushes.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: PhysicalSink> Seek for ChildStream<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let offset = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "child streams have no end to seek from",
                ))
            }
        };

        let offset = offset.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek position out of range")
        })?;
        self.seek_to(offset).map_err(io::Error::other)?;

        Ok(self.position)
    }
}

#[cfg(test)]
mod tests {
    use feather_error::ErrorKind;
    use similar_asserts::assert_eq;
    use std::io::Cursor;

    use super::*;
    use crate::io::sink::{PaddingSink, SeekableSink};

    fn padding_mux() -> Arc<StreamMultiplexer<PaddingSink<Vec<u8>>>> {
        Arc::new(StreamMultiplexer::new(
            PaddingSink::new(Vec::new(), 0),
            MultiplexerConfig::default(),
        ))
    }

    #[test]
    fn reverse_arrival_committed_in_offset_order() {
        logutil::configure_global_logger(tracing::Level::DEBUG, logutil::LogFormat::HumanReadable);

        let mux = padding_mux();
        let mut x = mux.create_child();
        let mut y = mux.create_child();

        y.write_at(4, b"Y").unwrap();
        x.write_at(0, b"X").unwrap();

        x.request_flush().unwrap();
        assert_eq!(2, mux.pending_count());
        y.request_flush().unwrap();
        assert_eq!(0, mux.pending_count());

        x.close().unwrap();
        y.close().unwrap();

        let mux = Arc::try_unwrap(mux).unwrap();
        assert_eq!(b"X\0\0\0Y".to_vec(), mux.into_sink().into_inner());
    }

    #[test]
    fn contiguous_writes() {
        let mux = padding_mux();
        let mut a = mux.create_child();
        let mut b = mux.create_child();

        b.write_at(4, b"5678").unwrap();
        a.write_bytes(b"1234").unwrap();
        assert_eq!(4, a.position());
        assert_eq!(8, b.position());

        a.close().unwrap();
        b.close().unwrap();

        let mux = Arc::try_unwrap(mux).unwrap();
        assert_eq!(b"12345678".to_vec(), mux.into_sink().into_inner());
    }

    #[test]
    fn backward_write_rejected() {
        let mux = padding_mux();
        let mut child = mux.create_child();
        child.write_at(8, b"abc").unwrap();

        let err = child.write_at(10, b"d").unwrap_err();
        assert_eq!(ErrorKind::BackwardSeek, err.kind());

        let err = child.seek_to(0).unwrap_err();
        assert_eq!(ErrorKind::BackwardSeek, err.kind());

        // Position unchanged by the failed calls.
        assert_eq!(11, child.position());
        child.write_at(11, b"d").unwrap();
    }

    #[test]
    fn last_removal_flushes() {
        let mux = padding_mux();
        let mut child = mux.create_child();
        child.write_bytes(b"data").unwrap();
        assert_eq!(1, mux.pending_count());

        child.close().unwrap();
        assert_eq!(0, mux.pending_count());
        assert_eq!(4, mux.with_sink(|s| s.position()));
    }

    #[test]
    fn no_flush_until_all_ready() {
        let mux = padding_mux();
        let mut a = mux.create_child();
        let b = mux.create_child();

        a.write_bytes(b"a").unwrap();
        a.request_flush().unwrap();
        assert_eq!(1, mux.pending_count());
        assert_eq!(0, mux.with_sink(|s| s.position()));

        // Removing the only child that hasn't requested a flush completes the
        // barrier.
        b.close().unwrap();
        assert_eq!(0, mux.pending_count());
        assert_eq!(1, mux.with_sink(|s| s.position()));

        // Flags reset after the barrier.
        a.write_bytes(b"b").unwrap();
        let mut c = mux.create_child();
        c.seek_to(2).unwrap();
        c.request_flush().unwrap();
        assert_eq!(1, mux.pending_count());

        a.request_flush().unwrap();
        assert_eq!(0, mux.pending_count());
        assert_eq!(2, mux.with_sink(|s| s.position()));
    }

    #[test]
    fn failed_barrier_recovers() {
        let mux = padding_mux();
        let mut a = mux.create_child();
        let mut b = mux.create_child();

        b.write_at(8, b"B").unwrap();
        a.write_bytes(b"A").unwrap();
        a.request_flush().unwrap();
        b.request_flush().unwrap();
        assert_eq!(9, mux.with_sink(|s| s.position()));
        assert_eq!(2, mux.pool.available());

        // `a` is still at 1, behind what the sink already committed.
        a.write_at(2, b"late").unwrap();
        b.write_at(16, b"ok").unwrap();
        b.request_flush().unwrap();
        let err = a.request_flush().unwrap_err();
        assert_eq!(ErrorKind::BackwardSeek, err.kind());

        assert_eq!(0, mux.pending_count());
        assert_eq!(2, mux.pool.available());
        assert_eq!(9, mux.with_sink(|s| s.position()));

        // The failed barrier still ended, so `b` has to opt in again.
        b.write_at(24, b"z").unwrap();
        b.request_flush().unwrap();
        assert_eq!(1, mux.pending_count());

        a.close().unwrap();
        assert_eq!(0, mux.pending_count());
        assert_eq!(25, mux.with_sink(|s| s.position()));
        b.close().unwrap();
    }

    #[test]
    fn double_removal() {
        let mux = padding_mux();
        let child = mux.create_child();
        let id = child.id();
        child.close().unwrap();

        let err = mux.remove_child(id).unwrap_err();
        assert_eq!(ErrorKind::DoubleDisposal, err.kind());
    }

    #[test]
    fn drop_removes_child() {
        let mux = padding_mux();
        {
            let mut child = mux.create_child();
            child.write_bytes(b"zz").unwrap();
        }
        assert_eq!(0, mux.child_count());
        assert_eq!(0, mux.pending_count());
        assert_eq!(2, mux.with_sink(|s| s.position()));
    }

    #[test]
    fn new_child_starts_at_min_position() {
        let mux = padding_mux();
        let mut a = mux.create_child();
        let mut b = mux.create_child();
        a.seek_to(16).unwrap();
        b.seek_to(8).unwrap();

        let c = mux.create_child();
        assert_eq!(8, c.position());
    }

    #[test]
    fn io_traits() {
        let mux = Arc::new(StreamMultiplexer::new(
            SeekableSink::new(Cursor::new(Vec::new())).unwrap(),
            MultiplexerConfig::default(),
        ));
        let mut child = mux.create_child();

        child.seek(SeekFrom::Start(2)).unwrap();
        child.write_all(b"ab").unwrap();
        assert_eq!(6, child.seek(SeekFrom::Current(2)).unwrap());
        child.write_all(b"c").unwrap();

        assert!(child.seek(SeekFrom::Current(-1)).is_err());
        assert!(child.seek(SeekFrom::End(0)).is_err());

        child.close().unwrap();
        let mux = Arc::try_unwrap(mux).unwrap();
        assert_eq!(
            b"\0\0ab\0\0c".to_vec(),
            mux.into_sink().into_inner().into_inner()
        );
    }

    #[test]
    fn concurrent_children() {
        let mux = padding_mux();
        let children: Vec<_> = (0..4).map(|_| mux.create_child()).collect();

        std::thread::scope(|s| {
            for (idx, mut child) in children.into_iter().enumerate() {
                s.spawn(move || {
                    // Each child owns 4 bytes at idx * 4, written back to
                    // front in two halves.
                    let base = idx as u64 * 4;
                    let byte = b'a' + idx as u8;
                    child.write_at(base + 2, &[byte, byte]).unwrap();
                    child.request_flush().unwrap();
                    child.close().unwrap();
                });
            }
        });

        let mux = Arc::try_unwrap(mux).unwrap();
        assert_eq!(
            b"\0\0aa\0\0bb\0\0cc\0\0dd".to_vec(),
            mux.into_sink().into_inner()
        );
    }
}
