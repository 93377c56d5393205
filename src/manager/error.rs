//! Error taxonomy for the memory manager.

use thiserror::Error;

use super::registry::RegistryError;
use crate::pool::PoolError;

/// Errors surfaced to the host runtime.
///
/// No recovery happens at this layer; every failure aborts the in-flight call
/// and leaves the registry unchanged. Retry or fallback on exhaustion is the
/// caller's responsibility.
#[derive(Debug, Error)]
pub enum MemoryManagerError {
    /// An operation that needs a bound pool ran before `initialize`.
    #[error("memory manager is not initialized")]
    NotInitialized,

    /// The bound pool could not serve the request.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// A release fired for an address with no live allocation.
    #[error("double free of device address {address:#x}")]
    DoubleFree { address: u64 },

    /// Registry bookkeeping rejected the operation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The capability is intentionally not implemented.
    #[error("{0} is not supported by this memory manager")]
    Unsupported(&'static str),

    /// The process-wide manager slot is already occupied.
    #[error("a device memory manager is already installed")]
    AlreadyInstalled,
}
