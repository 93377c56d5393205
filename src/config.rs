//! Configuration loading from environment variables.
//!
//! All configuration values are loaded from `EMM_CORE_*` environment
//! variables with sensible defaults. Invalid values fall back to defaults
//! without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `EMM_CORE_LOG_ALLOCATIONS` | false | One log line per allocation/free |
//! | `EMM_CORE_STRICT_RESET` | false | Fail `reset` when no pool is bound |
//! | `EMM_CORE_POOL_CAPACITY` | 4294967296 | Default pool capacity (bytes) |

use crate::manager::ManagerConfig;
use crate::pool::PoolConfig;

/// Effective configuration summary.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub log_allocations: bool,
    pub strict_reset: bool,
    pub pool_capacity_bytes: u64,
}

/// All configuration loaded from environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub manager: ManagerConfig,
    pub pool: PoolConfig,
}

/// Parse a bool env var, returning `default` on missing or invalid.
fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let capacity = parse_u64("EMM_CORE_POOL_CAPACITY", 4 * 1024 * 1024 * 1024);
    let capacity = capacity.max(1024 * 1024); // floor: 1 MiB

    EnvConfig {
        manager: ManagerConfig {
            log_allocations: parse_bool("EMM_CORE_LOG_ALLOCATIONS", false),
            strict_reset: parse_bool("EMM_CORE_STRICT_RESET", false),
        },
        pool: PoolConfig {
            capacity_bytes: capacity,
        },
    }
}

impl EnvConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            log_allocations: self.manager.log_allocations,
            strict_reset: self.manager.strict_reset,
            pool_capacity_bytes: self.pool.capacity_bytes,
        }
    }
}
