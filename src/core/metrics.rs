// src/core/metrics.rs

//! Defines and registers Prometheus metrics for the controller's fleet.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only
//! once globally for the controller's lifetime. Exporting these over HTTP is
//! a transport concern left to the surrounding binary; this module only owns
//! the registry.

use lazy_static::lazy_static;
use prometheus::{
    Gauge, GaugeVec, IntCounterVec, TextEncoder, register_gauge, register_gauge_vec,
    register_int_counter_vec,
};

lazy_static! {
    /// Total diagnoses observed, labeled by diagnosis kind.
    pub static ref DIAGNOSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "vtgr_diagnoses_total",
        "Total number of diagnoses performed, labeled by diagnosis kind.",
        &["keyspace", "shard", "diagnosis"]
    )
    .unwrap();

    /// Total repair actions attempted, labeled by diagnosis and outcome.
    pub static ref REPAIRS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "vtgr_repairs_total",
        "Total number of repair actions attempted, labeled by diagnosis and outcome.",
        &["keyspace", "shard", "diagnosis", "outcome"]
    )
    .unwrap();

    /// 1 when the shard's last diagnosis was Healthy, 0 otherwise.
    pub static ref SHARD_HEALTHY: GaugeVec = register_gauge_vec!(
        "vtgr_shard_healthy",
        "Whether the shard's last diagnosis was Healthy (1) or not (0).",
        &["keyspace", "shard"]
    )
    .unwrap();

    /// Current anti-thrash backoff duration in seconds, 0 when not backing off.
    pub static ref ANTI_THRASH_BACKOFF_SECONDS: GaugeVec = register_gauge_vec!(
        "vtgr_anti_thrash_backoff_seconds",
        "Current anti-thrash backoff duration in seconds for the shard.",
        &["keyspace", "shard"]
    )
    .unwrap();

    /// Number of shards currently supervised by the fleet.
    pub static ref ACTIVE_SHARDS: Gauge = register_gauge!(
        "vtgr_active_shards",
        "Number of shards currently supervised by the fleet."
    )
    .unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap()
}
