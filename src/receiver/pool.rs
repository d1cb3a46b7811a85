//! Reusable byte buffers for encoding bid responses.
//!
//! Buffers are pooled per worker thread: each thread maps onto one shard of
//! the pool, so concurrent encoders rarely contend on the same lock. A
//! checked-out buffer returns to the shard it came from.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};

/// Sharded, bounded free lists of byte buffers.
#[derive(Debug)]
pub struct BufferPool {
    shards: Box<[Mutex<Vec<Vec<u8>>>]>,
    max_pooled: usize,
    initial_capacity: usize,
}

impl BufferPool {
    /// One shard per available core, each holding up to `max_pooled` buffers.
    pub fn new(max_pooled: usize, initial_capacity: usize) -> Self {
        let shards = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Self::with_shards(shards, max_pooled, initial_capacity)
    }

    pub fn with_shards(shards: usize, max_pooled: usize, initial_capacity: usize) -> Self {
        Self {
            shards: (0..shards.max(1))
                .map(|_| Mutex::new(Vec::with_capacity(max_pooled)))
                .collect(),
            max_pooled,
            initial_capacity,
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Borrow an empty buffer from the calling thread's shard; it returns
    /// there when dropped.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let shard = self.current_shard();
        let buffer = self.shards[shard]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.initial_capacity));
        PooledBuffer {
            pool: self,
            shard,
            buffer,
        }
    }

    /// Buffers currently idle across all shards.
    pub fn pooled(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    fn current_shard(&self) -> usize {
        let mut hasher = DefaultHasher::new();
        std::thread::current().id().hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    fn release(&self, shard: usize, mut buffer: Vec<u8>) {
        buffer.clear();
        let mut free = self.shards[shard]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.max_pooled {
            free.push(buffer);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(64, 4096)
    }
}

/// RAII handle to a pooled buffer.
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    shard: usize,
    buffer: Vec<u8>,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buffer
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(self.shard, std::mem::take(&mut self.buffer));
    }
}
