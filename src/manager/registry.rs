// Copyright 2025-2026 emm-core contributors
// Licensed under the Apache License, Version 2.0

//! Bookkeeping for allocations currently owned by the host runtime.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use parking_lot::Mutex;
use thiserror::Error;

use crate::pool::PoolAllocation;

/// Registry bookkeeping errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Insert hit an address that is already live. Pools hand out fresh
    /// addresses, so this is an invariant violation, not a user error.
    #[error("device address {address:#x} is already registered")]
    DuplicateAddress { address: u64 },

    /// Remove missed: a double free, or an address never registered.
    #[error("device address {address:#x} is not registered")]
    UnknownAddress { address: u64 },
}

/// Tracks outstanding allocations so each free matches its originating pool
/// allocation and runs exactly once.
///
/// Invariant: an address is present iff a live handle exists for it. Inserts
/// happen synchronously inside the allocate path, removals synchronously
/// inside the release path.
#[derive(Default)]
pub struct AllocationRegistry {
    live: Mutex<HashMap<u64, PoolAllocation>>,
}

impl AllocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an allocation under its device address.
    ///
    /// On `DuplicateAddress` the map is left unchanged and the rejected
    /// allocation drops back to its pool.
    pub fn insert(&self, allocation: PoolAllocation) -> Result<(), RegistryError> {
        let address = allocation.address();
        let mut live = self.live.lock();
        match live.entry(address) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateAddress { address }),
            Entry::Vacant(slot) => {
                slot.insert(allocation);
                Ok(())
            }
        }
    }

    /// Remove and return the allocation registered at `address`.
    pub fn remove(&self, address: u64) -> Result<PoolAllocation, RegistryError> {
        self.live
            .lock()
            .remove(&address)
            .ok_or(RegistryError::UnknownAddress { address })
    }

    pub fn contains(&self, address: u64) -> bool {
        self.live.lock().contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.lock().is_empty()
    }

    /// Addresses of all live allocations, unordered.
    pub fn addresses(&self) -> Vec<u64> {
        self.live.lock().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::pool::{CachingDevicePool, DevicePool, PoolBlock};

    fn allocation(pool: &Arc<CachingDevicePool>, nbytes: u64) -> PoolAllocation {
        let block = pool.malloc(nbytes).unwrap();
        PoolAllocation::new(block, pool.clone())
    }

    #[test]
    fn insert_then_remove_round_trips_the_allocation() {
        let pool = Arc::new(CachingDevicePool::with_capacity(1024 * 1024));
        let registry = AllocationRegistry::new();

        let alloc = allocation(&pool, 80);
        let address = alloc.address();
        registry.insert(alloc).unwrap();
        assert!(registry.contains(address));
        assert_eq!(registry.len(), 1);

        let removed = registry.remove(address).unwrap();
        assert_eq!(removed.address(), address);
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_of_unknown_address_fails() {
        let registry = AllocationRegistry::new();
        let result = registry.remove(0xdead);
        assert!(matches!(
            result,
            Err(RegistryError::UnknownAddress { address: 0xdead })
        ));
    }

    #[test]
    fn duplicate_insert_is_rejected_and_map_unchanged() {
        let pool = Arc::new(CachingDevicePool::with_capacity(1024 * 1024));
        let registry = AllocationRegistry::new();

        let first = PoolAllocation::new(PoolBlock { address: 42, size: 512 }, pool.clone());
        registry.insert(first).unwrap();

        let clash = PoolAllocation::new(PoolBlock { address: 42, size: 512 }, pool.clone());
        let result = registry.insert(clash);
        assert!(matches!(
            result,
            Err(RegistryError::DuplicateAddress { address: 42 })
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn dropping_a_removed_allocation_frees_back_to_the_pool() {
        let pool = Arc::new(CachingDevicePool::with_capacity(1024 * 1024));
        let registry = AllocationRegistry::new();

        let alloc = allocation(&pool, 256);
        let address = alloc.address();
        registry.insert(alloc).unwrap();
        assert_eq!(pool.cached_bytes(), 0);

        drop(registry.remove(address).unwrap());
        assert_eq!(pool.cached_bytes(), 512);
        assert_eq!(pool.live_blocks(), 0);
    }
}
