//! Fixed-chunk pool allocator.
//!
//! Storage is a list of pools, each one contiguous block of equally sized
//! chunks holding exactly one item. Acquiring scans for the first free chunk
//! (lowest pool, lowest index) and only creates a new pool when every existing
//! one is full. The number of pools is capped: running past the cap is a fatal
//! [`Error::PoolExhausted`]. Released chunks are marked free and reused; memory
//! is never compacted.
//!
//! The evaluator parks intermediate results here while it reduces an
//! S-expression, which bounds the number of live temporaries.

use crate::{Error, MAX_POOLS, POOL_SIZE};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

/// Allocator limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Chunks in every pool
    pub chunks_per_pool: usize,
    /// Maximum number of pools that may be created
    pub max_pools: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            chunks_per_pool: POOL_SIZE,
            max_pools: MAX_POOLS,
        }
    }
}

/// Handle to an acquired chunk.
///
/// Not `Clone`/`Copy`: [`MemoryPool::release`] consumes it, so a chunk can only
/// be released once. Each handle remembers the allocator that minted it.
#[derive(Debug, PartialEq, Eq)]
pub struct ChunkRef {
    owner: u32,
    pool: u32,
    index: u32,
}

impl ChunkRef {
    fn new(owner: u32, pool: usize, index: usize) -> Self {
        Self {
            owner,
            pool: pool as u32,
            index: index as u32,
        }
    }

    fn pool(&self) -> usize {
        self.pool as usize
    }

    fn index(&self) -> usize {
        self.index as usize
    }
}

/// One contiguous block of chunks. A chunk is in use when it holds an item.
struct Pool<T> {
    chunks: Vec<Option<T>>,
    used: usize,
}

impl<T> Pool<T> {
    fn new(size: usize) -> Self {
        let mut chunks = Vec::with_capacity(size);
        chunks.resize_with(size, || None);
        Pool { chunks, used: 0 }
    }

    fn has_space(&self) -> bool {
        self.used < self.chunks.len()
    }

    /// Scan from the lowest index for a free chunk and claim it
    fn claim(&mut self, item: T) -> Result<usize, T> {
        match self.chunks.iter().position(Option::is_none) {
            Some(index) => {
                self.chunks[index] = Some(item);
                self.used += 1;
                Ok(index)
            }
            None => Err(item),
        }
    }
}

/// Allocation counters. Reading them has no effect on allocation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub pools_created: usize,
    /// Chunks currently in use
    pub chunks_allocated: usize,
    /// Total number of successful acquisitions
    pub chunks_allocated_lifetime: usize,
    /// Highest number of chunks in use at the same time
    pub high_watermark: usize,
}

static NEXT_ALLOCATOR_ID: AtomicU32 = AtomicU32::new(0);

pub struct MemoryPool<T> {
    id: u32,
    pools: Vec<Pool<T>>,
    config: PoolConfig,
    stats: PoolStats,
}

impl<T> MemoryPool<T> {
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Pools are created lazily, on the first acquisition that needs one
    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            id: NEXT_ALLOCATOR_ID.fetch_add(1, Ordering::Relaxed),
            pools: Vec::with_capacity(config.max_pools.min(16)),
            config,
            stats: PoolStats::default(),
        }
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Store `item` in the first free chunk, creating a pool if all are full
    pub fn acquire(&mut self, item: T) -> Result<ChunkRef, Error> {
        let mut item = item;
        loop {
            for (pool_idx, pool) in self.pools.iter_mut().enumerate() {
                if !pool.has_space() {
                    continue;
                }
                match pool.claim(item) {
                    Ok(index) => {
                        self.stats.chunks_allocated += 1;
                        self.stats.chunks_allocated_lifetime += 1;
                        self.stats.high_watermark =
                            self.stats.high_watermark.max(self.stats.chunks_allocated);
                        return Ok(ChunkRef::new(self.id, pool_idx, index));
                    }
                    Err(returned) => item = returned,
                }
            }
            self.create_pool()?;
        }
    }

    fn create_pool(&mut self) -> Result<(), Error> {
        if self.pools.len() >= self.config.max_pools || self.config.chunks_per_pool == 0 {
            warn!(
                pools = self.pools.len(),
                chunks_per_pool = self.config.chunks_per_pool,
                "memory pool exhausted"
            );
            return Err(Error::PoolExhausted {
                max_pools: self.config.max_pools,
                chunks_per_pool: self.config.chunks_per_pool,
            });
        }

        self.pools.push(Pool::new(self.config.chunks_per_pool));
        self.stats.pools_created += 1;
        debug!(
            pool = self.pools.len(),
            chunks = self.config.chunks_per_pool,
            "created memory pool"
        );
        Ok(())
    }

    /// Mark the chunk free and hand back the item it held. `None` for a
    /// handle minted by another allocator.
    pub fn release(&mut self, chunk: ChunkRef) -> Option<T> {
        if chunk.owner != self.id {
            warn!(owner = chunk.owner, allocator = self.id, "released a foreign chunk");
            return None;
        }
        let pool = self.pools.get_mut(chunk.pool())?;
        let item = pool.chunks.get_mut(chunk.index())?.take()?;
        pool.used -= 1;
        self.stats.chunks_allocated -= 1;
        Some(item)
    }

    pub fn get(&self, chunk: &ChunkRef) -> Option<&T> {
        if chunk.owner != self.id {
            return None;
        }
        self.pools
            .get(chunk.pool())
            .and_then(|pool| pool.chunks.get(chunk.index()))
            .and_then(Option::as_ref)
    }

    /// Release a batch of chunks in order, collecting their items. Foreign
    /// handles are skipped.
    pub fn release_all(&mut self, chunks: Vec<ChunkRef>) -> Vec<T> {
        chunks
            .into_iter()
            .filter_map(|chunk| self.release(chunk))
            .collect()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}

impl<T> Default for MemoryPool<T> {
    fn default() -> Self {
        Self::new()
    }
}
