// Copyright 2025-2026 emm-core contributors
// Licensed under the Apache License, Version 2.0

//! Host-runtime seam: the device memory manager capability interface.

use std::sync::{Arc, OnceLock};

use super::error::MemoryManagerError;
use super::handle::AllocationHandle;
use super::plugin::CleanupGuard;

/// Contract version read by the host runtime for compatibility checks.
pub const INTERFACE_VERSION: u32 = 1;

/// Identifier of a device stream.
///
/// Only the default stream carries meaning for pool-backed allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamId(u64);

impl StreamId {
    pub const DEFAULT: StreamId = StreamId(0);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn is_default(self) -> bool {
        self.0 == 0
    }
}

/// Free/total device memory reported through the manager interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    pub free_bytes: u64,
    pub total_bytes: u64,
}

/// Token for mapping a device allocation into another process.
///
/// Pool-backed allocations cannot be exported cross-process, so no
/// constructor exists and `get_ipc_handle` always fails with `Unsupported`.
#[derive(Debug)]
pub enum IpcHandle {}

/// Device memory manager capability set, as consumed by the host runtime.
///
/// The runtime selects one implementation at process start via
/// [`set_memory_manager`] and serializes calls into it; implementations keep
/// their own locking for shared bookkeeping.
pub trait DeviceMemoryManager: Send + Sync {
    /// Bind the manager to its memory source. Must run before the first
    /// allocation.
    fn initialize(&self) -> Result<(), MemoryManagerError>;

    /// Allocate `nbytes` on the device.
    fn memalloc(
        &self,
        nbytes: u64,
        stream: StreamId,
    ) -> Result<AllocationHandle, MemoryManagerError>;

    /// Free/total device memory as seen by this manager.
    fn get_memory_info(&self) -> Result<MemoryInfo, MemoryManagerError>;

    /// Export `handle`'s allocation for another process.
    fn get_ipc_handle(&self, handle: &AllocationHandle) -> Result<IpcHandle, MemoryManagerError>;

    /// Release all currently-free device memory held by the manager.
    fn reset(&self) -> Result<(), MemoryManagerError>;

    /// Open a deferred-cleanup scope; frees are batched until the guard
    /// drops.
    fn defer_cleanup(&self) -> CleanupGuard;

    /// Contract version this manager implements.
    fn interface_version(&self) -> u32 {
        INTERFACE_VERSION
    }
}

static ACTIVE_MANAGER: OnceLock<Arc<dyn DeviceMemoryManager>> = OnceLock::new();

/// Install `manager` as the process-wide device memory manager.
///
/// Must run before any device allocation occurs. The first call wins; later
/// calls fail with `AlreadyInstalled`. Swapping managers after allocations
/// have occurred would orphan live handles, so re-invocation at that point is
/// a caller error.
pub fn set_memory_manager(
    manager: Arc<dyn DeviceMemoryManager>,
) -> Result<(), MemoryManagerError> {
    ACTIVE_MANAGER
        .set(manager)
        .map_err(|_| MemoryManagerError::AlreadyInstalled)
}

/// The currently-installed device memory manager, if any.
pub fn memory_manager() -> Option<Arc<dyn DeviceMemoryManager>> {
    ACTIVE_MANAGER.get().cloned()
}
