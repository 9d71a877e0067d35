use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// Fixed number of reusable byte buffers.
///
/// Slots are claimed and filled with atomic swaps so checking out or
/// returning a buffer never blocks. When every slot is empty a new buffer is
/// allocated, and buffers returned to a full pool are dropped.
#[derive(Debug)]
pub struct BufferPool {
    /// Each slot is either null or owns a boxed buffer created with
    /// `Box::into_raw`.
    slots: Box<[AtomicPtr<Vec<u8>>]>,
    min_capacity: usize,
}

impl BufferPool {
    pub fn new(slots: usize, min_capacity: usize) -> Self {
        let slots = (0..slots)
            .map(|_| AtomicPtr::new(ptr::null_mut()))
            .collect();
        BufferPool {
            slots,
            min_capacity,
        }
    }

    /// Get an empty buffer with room for at least `len` bytes.
    pub fn checkout(&self, len: usize) -> Vec<u8> {
        for slot in self.slots.iter() {
            let ptr = slot.swap(ptr::null_mut(), Ordering::AcqRel);
            if ptr.is_null() {
                continue;
            }

            // SAFETY: Non-null slot values always come from `Box::into_raw` in
            // `give_back`, and the swap left us as the only owner.
            let mut buf = *unsafe { Box::from_raw(ptr) };
            buf.clear();
            buf.reserve(len);
            return buf;
        }

        Vec::with_capacity(len.max(self.min_capacity))
    }

    /// Return a buffer to the pool.
    pub fn give_back(&self, buf: Vec<u8>) {
        let ptr = Box::into_raw(Box::new(buf));
        for slot in self.slots.iter() {
            if slot
                .compare_exchange(ptr::null_mut(), ptr, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }

        // Pool full.
        // SAFETY: `ptr` was created above and never published to a slot.
        drop(unsafe { Box::from_raw(ptr) });
    }

    /// Number of buffers currently sitting in the pool.
    pub fn available(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| !slot.load(Ordering::Acquire).is_null())
            .count()
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        for slot in self.slots.iter() {
            let ptr = slot.swap(ptr::null_mut(), Ordering::AcqRel);
            if !ptr.is_null() {
                // SAFETY: See `checkout`.
                drop(unsafe { Box::from_raw(ptr) });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_returned_buffers() {
        let pool = BufferPool::new(2, 16);
        let buf = pool.checkout(4);
        assert!(buf.capacity() >= 16);
        assert_eq!(0, pool.available());

        let mut buf = buf;
        buf.extend_from_slice(b"abcd");
        let ptr = buf.as_ptr();
        pool.give_back(buf);
        assert_eq!(1, pool.available());

        let buf = pool.checkout(8);
        assert!(buf.is_empty());
        assert_eq!(ptr, buf.as_ptr());
        assert_eq!(0, pool.available());
    }

    #[test]
    fn grows_on_demand() {
        let pool = BufferPool::new(1, 4);
        pool.give_back(Vec::with_capacity(4));
        let buf = pool.checkout(1024);
        assert!(buf.capacity() >= 1024);
    }

    #[test]
    fn full_pool_drops() {
        let pool = BufferPool::new(1, 4);
        pool.give_back(Vec::new());
        pool.give_back(Vec::new());
        assert_eq!(1, pool.available());
    }

    #[test]
    fn concurrent_checkout() {
        let pool = BufferPool::new(8, 64);
        std::thread::scope(|s| {
            for i in 0..4_u8 {
                let pool = &pool;
                s.spawn(move || {
                    for _ in 0..100 {
                        let mut buf = pool.checkout(32);
                        assert!(buf.is_empty());
                        buf.push(i);
                        pool.give_back(buf);
                    }
                });
            }
        });
        assert!(pool.available() <= 8);
    }
}
