// Copyright 2025-2026 emm-core contributors
// Licensed under the Apache License, Version 2.0

//! Caching device pool used as the default [`DevicePool`] binding.
//!
//! Freed blocks are cached and served back on an exact-size match instead of
//! going straight back to the device; `free_all_blocks` empties the cache.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{DevicePool, PoolBlock, PoolError, PoolMemoryInfo};

/// Allocation granularity. Requests round up to the next multiple.
const BLOCK_ROUNDING: u64 = 512;

/// Base of the synthetic device address range.
const ADDRESS_BASE: u64 = 0x7000_0000_0000;

/// Configuration for the caching pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Device capacity backing the pool (bytes).
    pub capacity_bytes: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: 4 * 1024 * 1024 * 1024, // 4 GiB
        }
    }
}

struct PoolState {
    /// Next carve address. Advances monotonically; addresses never recycle.
    next_address: u64,
    /// Blocks currently handed out, keyed by address.
    in_use: HashMap<u64, u64>,
    /// Freed blocks cached for reuse, binned by rounded size.
    cached: HashMap<u64, Vec<u64>>,
    /// Bytes held from the device (in use + cached).
    held_bytes: u64,
    /// Bytes sitting in the cache.
    cached_bytes: u64,
}

/// Pool that carves fresh blocks from a bump pointer and recycles freed
/// blocks on exact-size matches.
pub struct CachingDevicePool {
    capacity: u64,
    state: Mutex<PoolState>,
}

impl CachingDevicePool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            capacity: config.capacity_bytes,
            state: Mutex::new(PoolState {
                next_address: ADDRESS_BASE,
                in_use: HashMap::new(),
                cached: HashMap::new(),
                held_bytes: 0,
                cached_bytes: 0,
            }),
        }
    }

    pub fn with_capacity(capacity_bytes: u64) -> Self {
        Self::new(PoolConfig { capacity_bytes })
    }

    /// Bytes handed out and not yet returned.
    pub fn in_use_bytes(&self) -> u64 {
        let state = self.state.lock();
        state.held_bytes - state.cached_bytes
    }

    /// Bytes cached for reuse.
    pub fn cached_bytes(&self) -> u64 {
        self.state.lock().cached_bytes
    }

    /// Count of live (un-returned) blocks. Useful for leak detection.
    pub fn live_blocks(&self) -> usize {
        self.state.lock().in_use.len()
    }
}

impl DevicePool for CachingDevicePool {
    fn malloc(&self, nbytes: u64) -> Result<PoolBlock, PoolError> {
        let rounded = round_up(nbytes);
        let mut state = self.state.lock();

        // Exact-size cache hit.
        if let Some(address) = pop_cached(&mut state, rounded) {
            state.in_use.insert(address, rounded);
            return Ok(PoolBlock { address, size: rounded });
        }

        // Carve a fresh block; reclaim the cache first if capacity is short.
        if self.capacity - state.held_bytes < rounded {
            reclaim_cache(&mut state);
        }
        if self.capacity - state.held_bytes < rounded {
            return Err(PoolError::Exhausted {
                requested: nbytes,
                available: self.capacity - state.held_bytes,
            });
        }

        let address = state.next_address;
        state.next_address += rounded;
        state.held_bytes += rounded;
        state.in_use.insert(address, rounded);
        Ok(PoolBlock { address, size: rounded })
    }

    fn free(&self, block: &PoolBlock) {
        let mut state = self.state.lock();
        match state.in_use.remove(&block.address) {
            Some(size) => {
                state.cached.entry(size).or_default().push(block.address);
                state.cached_bytes += size;
            }
            None => {
                tracing::warn!(
                    address = block.address,
                    "free of a block the pool does not own"
                );
            }
        }
    }

    fn free_all_blocks(&self) {
        let mut state = self.state.lock();
        reclaim_cache(&mut state);
    }

    fn memory_info(&self) -> Option<PoolMemoryInfo> {
        let state = self.state.lock();
        Some(PoolMemoryInfo {
            free_bytes: state.cached_bytes,
            total_bytes: state.held_bytes,
        })
    }
}

fn round_up(nbytes: u64) -> u64 {
    nbytes.max(1).div_ceil(BLOCK_ROUNDING) * BLOCK_ROUNDING
}

fn pop_cached(state: &mut PoolState, size: u64) -> Option<u64> {
    let bin = state.cached.get_mut(&size)?;
    let address = bin.pop()?;
    if bin.is_empty() {
        state.cached.remove(&size);
    }
    state.cached_bytes -= size;
    Some(address)
}

/// Drop every cached block back to the device.
fn reclaim_cache(state: &mut PoolState) {
    state.held_bytes -= state.cached_bytes;
    state.cached_bytes = 0;
    state.cached.clear();
}
