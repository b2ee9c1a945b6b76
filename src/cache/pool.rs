//! Reusable Bucket Buffer Pool
//!
//! Every tick that harvests a non-empty bucket needs a fresh, empty map to
//! swap into the wheel, and every dispatched batch leaves an empty map
//! behind. Without recycling, a busy cache would allocate and drop one map
//! per shard per tick. The pool is a simple free list: shards take buffers
//! out, the dispatcher puts cleared ones back.
//!
//! This is the only state shared between the shard workers and the
//! dispatcher, so it is the one place in the crate that takes a lock.

use std::collections::HashMap;
use std::sync::Mutex;

/// A thread-safe free list of empty `HashMap` buffers.
pub(crate) struct BufferPool<K, V> {
    free: Mutex<Vec<HashMap<K, V>>>,
}

impl<K, V> BufferPool<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    /// Hands out an empty buffer, reusing a recycled one when available.
    pub(crate) fn get(&self) -> HashMap<K, V> {
        self.free.lock().unwrap().pop().unwrap_or_default()
    }

    /// Returns a buffer to the free list.
    ///
    /// The caller clears the buffer first; a non-empty buffer here would
    /// leak entries into a future bucket.
    pub(crate) fn put(&self, buf: HashMap<K, V>) {
        debug_assert!(buf.is_empty());
        self.free.lock().unwrap().push(buf);
    }

    /// Number of buffers currently sitting in the free list.
    #[cfg(test)]
    pub(crate) fn idle(&self) -> usize {
        self.free.lock().unwrap().len()
    }
}
