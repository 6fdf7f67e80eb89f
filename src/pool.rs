// Copyright (C) 2022 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of rfc-5424-encoder.
//
// rfc-5424-encoder is free software: you can redistribute it and/or modify it under the terms of
// the GNU General Public License as published by the Free Software Foundation, either version 3 of
// the License, or (at your option) any later version.
//
// rfc-5424-encoder is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See
// the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with rfc-5424-encoder.
// If not, see <http://www.gnu.org/licenses/>.
//! Reusable output buffers.
//!
//! Every encoded message is written into a [`Buffer`] drawn from a [`BufferPool`]. When the
//! [`Buffer`] is dropped (or explicitly [`free`](Buffer::free)d) its allocation goes back to the
//! pool for the next message.
//!
//! The free list is a bounded, lock-free queue, so the pool never makes a caller wait: if it's
//! empty a fresh buffer is allocated, and a buffer coming back to a full pool is simply
//! deallocated.

use crossbeam::queue::ArrayQueue;

use std::{
    ops::Deref,
    sync::{Arc, OnceLock},
};

/// Default cap on the number of idle buffers retained
pub const DEFAULT_MAX_IDLE: usize = 64;
/// Default cap on the capacity of a buffer that will be returned to the pool
pub const DEFAULT_MAX_CAPACITY: usize = 64 * 1024;
const INITIAL_CAPACITY: usize = 1024;

/// A free list of byte buffers, safe to share between threads.
#[derive(Debug)]
pub struct BufferPool {
    free: ArrayQueue<Vec<u8>>,
    max_capacity: usize,
}

impl std::default::Default for BufferPool {
    fn default() -> Self {
        BufferPool::new(DEFAULT_MAX_IDLE, DEFAULT_MAX_CAPACITY)
    }
}

impl BufferPool {
    /// A pool retaining at most `max_idle` buffers (at least one), each of capacity at most
    /// `max_capacity`.
    pub fn new(max_idle: usize, max_capacity: usize) -> BufferPool {
        BufferPool {
            free: ArrayQueue::new(max_idle.max(1)),
            max_capacity,
        }
    }

    /// The process-wide pool, created on first use.
    pub fn shared() -> Arc<BufferPool> {
        static SHARED: OnceLock<Arc<BufferPool>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(BufferPool::default())).clone()
    }

    /// Acquire an empty buffer.
    pub fn get(self: &Arc<Self>) -> Buffer {
        let bytes = self.free.pop().unwrap_or_else(|| {
            tracing::trace!("buffer pool empty; allocating");
            Vec::with_capacity(INITIAL_CAPACITY)
        });
        Buffer {
            bytes,
            pool: Some(self.clone()),
        }
    }

    /// Number of idle buffers, for tests & diagnostics
    pub fn idle(&self) -> usize {
        self.free.len()
    }

    fn put(&self, mut bytes: Vec<u8>) {
        if bytes.capacity() > self.max_capacity {
            return;
        }
        bytes.clear();
        // a full pool drops the buffer
        let _ = self.free.push(bytes);
    }
}

/// An append-only byte buffer on loan from a [`BufferPool`].
///
/// Dereferences to `[u8]`, so it can be handed straight to anything that writes bytes.
#[derive(Debug)]
pub struct Buffer {
    bytes: Vec<u8>,
    pool: Option<Arc<BufferPool>>,
}

impl Buffer {
    /// Return this buffer to its pool; equivalent to dropping it.
    pub fn free(self) {}
    /// Take the bytes, leaving the pool without this buffer.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.pool = None;
        std::mem::take(&mut self.bytes)
    }
    pub(crate) fn as_mut_vec(&mut self) -> &mut Vec<u8> {
        &mut self.bytes
    }
}

impl Deref for Buffer {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.put(std::mem::take(&mut self.bytes));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn buffers_are_recycled() {
        let pool = Arc::new(BufferPool::new(2, 1024 * 1024));
        let mut buf = pool.get();
        buf.as_mut_vec().extend_from_slice(b"hello");
        assert_eq!(&*buf, b"hello");
        buf.free();
        assert_eq!(pool.idle(), 1);

        let buf = pool.get();
        assert!(buf.is_empty());
        assert!(buf.bytes.capacity() >= 5);
        assert_eq!(pool.idle(), 0);

        let others: Vec<Buffer> = (0..4).map(|_| pool.get()).collect();
        drop(buf);
        drop(others);
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn oversized_buffers_are_dropped() {
        let pool = Arc::new(BufferPool::new(8, 16));
        let mut buf = pool.get();
        buf.as_mut_vec().extend_from_slice(&[0; 4096]);
        drop(buf);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn into_vec_detaches() {
        let pool = Arc::new(BufferPool::default());
        let mut buf = pool.get();
        buf.as_mut_vec().push(1);
        assert_eq!(buf.into_vec(), vec![1]);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn concurrent_releases_are_kept() {
        const THREADS: usize = 8;
        let pool = Arc::new(BufferPool::new(THREADS, DEFAULT_MAX_CAPACITY));
        let barrier = Arc::new(std::sync::Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let pool = pool.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let mut buf = pool.get();
                    buf.as_mut_vec().push(0);
                    // every thread holds a buffer before any is released
                    barrier.wait();
                    drop(buf);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(pool.idle(), THREADS);
    }

    #[test]
    fn concurrent_use() {
        let pool = Arc::new(BufferPool::default());
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let mut buf = pool.get();
                        buf.as_mut_vec().extend_from_slice(&[i; 16]);
                        assert!(buf.iter().all(|b| *b == i));
                        assert_eq!(buf.len(), 16);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(pool.idle() <= DEFAULT_MAX_IDLE);
    }
}
