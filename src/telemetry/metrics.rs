//! Metrics helpers over the `metrics` facade.
//!
//! Thin wrappers so manager call sites stay one-liners.

/// Record one successful device allocation of `nbytes` (pool-rounded).
pub fn record_allocation(nbytes: u64) {
    metrics::counter!("emm_allocations_total").increment(1);
    metrics::counter!("emm_allocated_bytes_total").increment(nbytes);
}

/// Record one release going back through the pool free path.
pub fn record_release(nbytes: u64) {
    metrics::counter!("emm_releases_total").increment(1);
    metrics::counter!("emm_released_bytes_total").increment(nbytes);
}

/// Update the gauge of allocations currently live in the registry.
pub fn record_live_allocations(count: usize) {
    metrics::gauge!("emm_live_allocations").set(count as f64);
}
