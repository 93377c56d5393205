// Copyright 2025-2026 emm-core contributors
// Licensed under the Apache License, Version 2.0

//! Runtime-visible allocation handles and their release callbacks.

use std::sync::Arc;

use super::error::MemoryManagerError;
use super::plugin::ManagerShared;

/// Release callback bound to one allocation.
///
/// A plain value type instead of a captured closure, so ownership of the
/// bookkeeping it reaches into stays explicit: shared manager state, device
/// address, requested size, logging flag.
pub(crate) struct Finalizer {
    shared: Arc<ManagerShared>,
    address: u64,
    nbytes: u64,
    logging: bool,
}

impl Finalizer {
    pub(crate) fn new(shared: Arc<ManagerShared>, address: u64, nbytes: u64, logging: bool) -> Self {
        Self {
            shared,
            address,
            nbytes,
            logging,
        }
    }

    /// Fire the release: log, unregister, hand the block back to the pool
    /// (immediately, or at deferred-scope exit).
    fn release(self) -> Result<(), MemoryManagerError> {
        // Size was captured at allocation time; the pool-level object no
        // longer exposes it once released.
        if self.logging {
            tracing::info!("Freeing {} bytes at {:#x}", self.nbytes, self.address);
        }
        self.shared.release(self.address)
    }
}

/// Token the host runtime holds for one live device allocation.
///
/// The runtime owns the handle; when its last reference goes away the bound
/// release callback fires exactly once. [`AllocationHandle::release`]
/// surfaces the outcome, dropping discards it.
pub struct AllocationHandle {
    address: u64,
    nbytes: u64,
    finalizer: Option<Finalizer>,
}

impl AllocationHandle {
    pub(crate) fn new(address: u64, nbytes: u64, finalizer: Finalizer) -> Self {
        Self {
            address,
            nbytes,
            finalizer: Some(finalizer),
        }
    }

    /// Device address of the allocation.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Requested size in bytes.
    pub fn size(&self) -> u64 {
        self.nbytes
    }

    /// Release the allocation now, surfacing any bookkeeping error.
    pub fn release(mut self) -> Result<(), MemoryManagerError> {
        match self.finalizer.take() {
            Some(finalizer) => finalizer.release(),
            None => Ok(()),
        }
    }
}

impl Drop for AllocationHandle {
    fn drop(&mut self) {
        if let Some(finalizer) = self.finalizer.take() {
            let _ = finalizer.release();
        }
    }
}
