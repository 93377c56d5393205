// Copyright 2025-2026 emm-core contributors
// Licensed under the Apache License, Version 2.0

//! Pool-backed device memory manager.
//!
//! The manager owns no allocation strategy of its own: every `memalloc`
//! delegates to the bound [`DevicePool`], wraps the returned block in a
//! registered [`PoolAllocation`], and hands the runtime an
//! [`AllocationHandle`] whose release callback unregisters the entry and runs
//! the pool's free path. Binding happens once, in `initialize`; operations
//! that need a pool fail with `NotInitialized` before that.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::error::MemoryManagerError;
use super::handle::{AllocationHandle, Finalizer};
use super::interface::{
    set_memory_manager, DeviceMemoryManager, IpcHandle, MemoryInfo, StreamId,
};
use super::registry::AllocationRegistry;
use crate::pool::{default_pool, DevicePool, PoolAllocation};
use crate::telemetry;

/// Behavior knobs distinguishing the manager variants.
#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    /// Emit one log line per allocation and per free.
    pub log_allocations: bool,
    /// Fail `reset` when no pool is bound instead of treating it as a no-op.
    pub strict_reset: bool,
}

/// Plugin lifecycle. Binding happens once; there is no way back short of
/// process teardown.
enum PluginState {
    Uninitialized,
    Initialized { pool: Arc<dyn DevicePool> },
}

/// Deferred-cleanup scope bookkeeping.
#[derive(Default)]
struct DeferredFrees {
    depth: usize,
    pending: Vec<PoolAllocation>,
}

/// State shared between the manager, its handles, and cleanup guards.
pub(crate) struct ManagerShared {
    state: RwLock<PluginState>,
    registry: AllocationRegistry,
    deferred: Mutex<DeferredFrees>,
}

impl ManagerShared {
    fn bound_pool(&self) -> Option<Arc<dyn DevicePool>> {
        match &*self.state.read() {
            PluginState::Initialized { pool } => Some(pool.clone()),
            PluginState::Uninitialized => None,
        }
    }

    /// Unregister `address` and run (or queue) its pool free path.
    pub(crate) fn release(&self, address: u64) -> Result<(), MemoryManagerError> {
        let allocation = self
            .registry
            .remove(address)
            .map_err(|_| MemoryManagerError::DoubleFree { address })?;
        telemetry::record_release(allocation.size());
        telemetry::record_live_allocations(self.registry.len());
        self.dispose(allocation);
        Ok(())
    }

    fn dispose(&self, allocation: PoolAllocation) {
        let mut deferred = self.deferred.lock();
        if deferred.depth > 0 {
            deferred.pending.push(allocation);
        } else {
            drop(deferred);
            drop(allocation);
        }
    }

    fn enter_cleanup_scope(&self) {
        self.deferred.lock().depth += 1;
    }

    fn exit_cleanup_scope(&self) {
        let flushed = {
            let mut deferred = self.deferred.lock();
            deferred.depth -= 1;
            if deferred.depth == 0 {
                std::mem::take(&mut deferred.pending)
            } else {
                Vec::new()
            }
        };
        // Frees run outside the scope lock.
        drop(flushed);
    }
}

/// Scoped suppression of release-to-pool for freed blocks.
///
/// The scope closes when the guard drops, on every exit path; a failure
/// inside the scope still flushes the queued frees and then propagates.
/// Scopes nest, and only the outermost exit flushes.
#[must_use = "the cleanup scope closes as soon as the guard is dropped"]
pub struct CleanupGuard {
    shared: Arc<ManagerShared>,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.shared.exit_cleanup_scope();
    }
}

/// Device memory manager that delegates allocation to an external pool.
pub struct PoolMemoryManager {
    shared: Arc<ManagerShared>,
    config: ManagerConfig,
}

impl PoolMemoryManager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            shared: Arc::new(ManagerShared {
                state: RwLock::new(PluginState::Uninitialized),
                registry: AllocationRegistry::new(),
                deferred: Mutex::new(DeferredFrees::default()),
            }),
            config,
        }
    }

    /// Bind `pool` as this manager's memory source. The first bind wins;
    /// later calls are no-ops, since rebinding would orphan live registry
    /// entries.
    pub fn bind_pool(&self, pool: Arc<dyn DevicePool>) {
        let mut state = self.shared.state.write();
        if matches!(*state, PluginState::Uninitialized) {
            *state = PluginState::Initialized { pool };
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.bound_pool().is_some()
    }

    /// Count of live allocations owned by this manager.
    pub fn live_allocations(&self) -> usize {
        self.shared.registry.len()
    }

    /// Device addresses of live allocations, unordered.
    pub fn live_addresses(&self) -> Vec<u64> {
        self.shared.registry.addresses()
    }

    /// The finalizer entry point: unregister `address` and run its pool free
    /// path. Handles call this when the runtime drops its last reference; the
    /// runtime never calls it directly. A second release of the same address
    /// fails with `DoubleFree` and frees nothing.
    pub fn release(&self, address: u64) -> Result<(), MemoryManagerError> {
        self.shared.release(address)
    }
}

impl DeviceMemoryManager for PoolMemoryManager {
    /// Bind to the process-wide default pool. Idempotent once bound.
    fn initialize(&self) -> Result<(), MemoryManagerError> {
        self.bind_pool(default_pool());
        Ok(())
    }

    fn memalloc(
        &self,
        nbytes: u64,
        stream: StreamId,
    ) -> Result<AllocationHandle, MemoryManagerError> {
        let pool = self
            .shared
            .bound_pool()
            .ok_or(MemoryManagerError::NotInitialized)?;

        if !stream.is_default() {
            // Advisory only: the pool has no stream-ordered semantics.
            tracing::warn!(stream = stream.raw(), "non-default stream has no effect");
        }

        let block = pool.malloc(nbytes)?;
        let allocation = PoolAllocation::new(block, pool);
        let address = allocation.address();
        let rounded = allocation.size();

        if self.config.log_allocations {
            tracing::info!("Allocated {} bytes at {:#x}", nbytes, address);
        }

        self.shared.registry.insert(allocation)?;
        telemetry::record_allocation(rounded);
        telemetry::record_live_allocations(self.shared.registry.len());

        let finalizer = Finalizer::new(
            self.shared.clone(),
            address,
            nbytes,
            self.config.log_allocations,
        );
        Ok(AllocationHandle::new(address, nbytes, finalizer))
    }

    fn get_memory_info(&self) -> Result<MemoryInfo, MemoryManagerError> {
        let pool = self
            .shared
            .bound_pool()
            .ok_or(MemoryManagerError::NotInitialized)?;
        let info = pool
            .memory_info()
            .ok_or(MemoryManagerError::Unsupported("get_memory_info"))?;
        Ok(MemoryInfo {
            free_bytes: info.free_bytes,
            total_bytes: info.total_bytes,
        })
    }

    fn get_ipc_handle(&self, _handle: &AllocationHandle) -> Result<IpcHandle, MemoryManagerError> {
        // Pool blocks carry no cross-process mapping bookkeeping.
        Err(MemoryManagerError::Unsupported("get_ipc_handle"))
    }

    /// Release all currently-free pool blocks back to the device.
    ///
    /// An unbound manager no-ops unless `strict_reset` asks for the faulting
    /// behavior.
    fn reset(&self) -> Result<(), MemoryManagerError> {
        match self.shared.bound_pool() {
            Some(pool) => {
                pool.free_all_blocks();
                Ok(())
            }
            None if self.config.strict_reset => Err(MemoryManagerError::NotInitialized),
            None => Ok(()),
        }
    }

    fn defer_cleanup(&self) -> CleanupGuard {
        self.shared.enter_cleanup_scope();
        CleanupGuard {
            shared: self.shared.clone(),
        }
    }
}

/// Build a [`PoolMemoryManager`] from `config` and install it as the
/// process-wide device memory manager.
pub fn install_pool_manager(
    config: ManagerConfig,
) -> Result<Arc<PoolMemoryManager>, MemoryManagerError> {
    let manager = Arc::new(PoolMemoryManager::new(config));
    set_memory_manager(manager.clone())?;
    Ok(manager)
}

#[cfg(test)]
#[path = "plugin_tests.rs"]
mod tests;
