// Copyright 2025-2026 emm-core contributors
// Licensed under the Apache License, Version 2.0

//! Device memory pool seam.
//!
//! The manager delegates all real allocation work to an external pool behind
//! the [`DevicePool`] trait. Blocks flow back to the pool through
//! [`PoolAllocation`]'s drop, so each block runs the pool's free path at most
//! once.

mod caching;

pub use caching::{CachingDevicePool, PoolConfig};

use std::sync::{Arc, OnceLock};

use thiserror::Error;

/// Errors raised by a device pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("device pool exhausted: requested {requested} bytes, available {available} bytes")]
    Exhausted { requested: u64, available: u64 },

    #[error("a default device pool is already installed")]
    AlreadyInstalled,
}

/// Free/total device memory as seen by a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolMemoryInfo {
    pub free_bytes: u64,
    pub total_bytes: u64,
}

/// One block handed out by a pool.
///
/// The address is an opaque device address, never a host pointer. The size is
/// the pool-rounded block size, which may exceed the requested byte count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolBlock {
    pub address: u64,
    pub size: u64,
}

/// External memory pool contract.
///
/// Pool internals (best-fit, buddy, slab) are the pool's own business; the
/// manager only needs carve, return, bulk-release, and an optional snapshot.
pub trait DevicePool: Send + Sync {
    /// Carve a buffer of `nbytes` out of the pool.
    fn malloc(&self, nbytes: u64) -> Result<PoolBlock, PoolError>;

    /// Return a block to the pool. Called exactly once per block, from
    /// [`PoolAllocation`]'s drop.
    fn free(&self, block: &PoolBlock);

    /// Release all currently-free blocks back to the device.
    fn free_all_blocks(&self);

    /// Free/total snapshot, when the pool exposes one.
    fn memory_info(&self) -> Option<PoolMemoryInfo> {
        None
    }
}

/// Owning wrapper for a pool block.
///
/// Dropping the wrapper runs the pool's free path; this is the release action
/// the handoff contract attaches to every allocation.
pub struct PoolAllocation {
    block: PoolBlock,
    pool: Arc<dyn DevicePool>,
}

impl PoolAllocation {
    pub fn new(block: PoolBlock, pool: Arc<dyn DevicePool>) -> Self {
        Self { block, pool }
    }

    /// Device address of the block.
    pub fn address(&self) -> u64 {
        self.block.address
    }

    /// Pool-rounded size of the block in bytes.
    pub fn size(&self) -> u64 {
        self.block.size
    }
}

impl Drop for PoolAllocation {
    fn drop(&mut self) {
        self.pool.free(&self.block);
    }
}

static DEFAULT_POOL: OnceLock<Arc<dyn DevicePool>> = OnceLock::new();

/// Install `pool` as the process-wide default pool. The first call wins.
pub fn set_default_pool(pool: Arc<dyn DevicePool>) -> Result<(), PoolError> {
    DEFAULT_POOL.set(pool).map_err(|_| PoolError::AlreadyInstalled)
}

/// The process-wide default pool.
///
/// Created on first use from the environment configuration when none was
/// installed explicitly.
pub fn default_pool() -> Arc<dyn DevicePool> {
    DEFAULT_POOL
        .get_or_init(|| Arc::new(CachingDevicePool::new(crate::config::load().pool)))
        .clone()
}
