//! Telemetry for the memory manager.
//!
//! Structured logging via `tracing` and a thin layer over the `metrics`
//! facade.

mod logging;
mod metrics;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{record_allocation, record_live_allocations, record_release};
