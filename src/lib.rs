// Copyright 2025-2026 emm-core contributors
// Licensed under the Apache License, Version 2.0

//! Pool-backed external memory manager for GPU compute runtimes.
//!
//! A host runtime that lets callers plug in a device memory manager can use
//! this crate to delegate allocation and free to an external memory pool:
//!
//! - [`manager`] — the plugin: capability set, allocation registry,
//!   runtime-visible handles, and the process-wide manager slot.
//! - [`pool`] — the external-pool seam and a caching pool used as the
//!   default binding.
//! - [`config`] — `EMM_CORE_*` environment configuration.
//! - [`telemetry`] — logging setup and metrics helpers.
//!
//! # Ownership Handoff
//!
//! ```text
//! memalloc(nbytes)
//!       │
//!       ▼
//! DevicePool::malloc ──► PoolAllocation ──► AllocationRegistry
//!                                                 │
//! AllocationHandle ◄── finalizer bound ───────────┘
//!       │  release() / drop
//!       ▼
//! registry entry removed ──► PoolAllocation dropped ──► DevicePool::free
//! ```
//!
//! An address is registered exactly while a live handle exists for it, and
//! its free path runs at most once.

pub mod config;
pub mod manager;
pub mod pool;
pub mod telemetry;

pub use manager::{
    install_pool_manager, memory_manager, set_memory_manager, AllocationHandle,
    AllocationRegistry, CleanupGuard, DeviceMemoryManager, IpcHandle, ManagerConfig, MemoryInfo,
    MemoryManagerError, PoolMemoryManager, RegistryError, StreamId, INTERFACE_VERSION,
};
pub use pool::{
    default_pool, set_default_pool, CachingDevicePool, DevicePool, PoolAllocation, PoolBlock,
    PoolConfig, PoolError, PoolMemoryInfo,
};
