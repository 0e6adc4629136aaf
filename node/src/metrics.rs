//! Prometheus metrics for the endorsement service.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`] that the HTTP `/metrics`
//! endpoint encodes into the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, Encoder, Histogram, HistogramOpts, IntCounter,
    IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::NodeError;

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Service operations by `operation` and `outcome` (`ok` or an error kind).
    pub requests: IntCounterVec,
    pub endorsements_created: IntCounter,
    pub endorsements_updated: IntCounter,
    pub endorsements_removed: IntCounter,
    pub stats_cache_hits: IntCounter,
    pub stats_cache_misses: IntCounter,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall time of each blocking store interaction, in milliseconds.
    pub store_latency_ms: Histogram,
}

impl NodeMetrics {
    /// Register every metric under a fresh [`Registry`].
    ///
    /// Metric names are fixed, so registration into a new registry cannot
    /// collide.
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests = register_int_counter_vec_with_registry!(
            Opts::new("plaudit_requests_total", "Service operations by outcome"),
            &["operation", "outcome"],
            registry
        )
        .expect("failed to register requests counter");

        let endorsements_created = register_int_counter_with_registry!(
            Opts::new(
                "plaudit_endorsements_created_total",
                "Endorsements recorded for a new (proposal, identity) pair"
            ),
            registry
        )
        .expect("failed to register endorsements_created counter");

        let endorsements_updated = register_int_counter_with_registry!(
            Opts::new(
                "plaudit_endorsements_updated_total",
                "Endorsements that replaced an existing record"
            ),
            registry
        )
        .expect("failed to register endorsements_updated counter");

        let endorsements_removed = register_int_counter_with_registry!(
            Opts::new(
                "plaudit_endorsements_removed_total",
                "Endorsements withdrawn"
            ),
            registry
        )
        .expect("failed to register endorsements_removed counter");

        let stats_cache_hits = register_int_counter_with_registry!(
            Opts::new(
                "plaudit_stats_cache_hits_total",
                "Global stats served from the cache"
            ),
            registry
        )
        .expect("failed to register stats_cache_hits counter");

        let stats_cache_misses = register_int_counter_with_registry!(
            Opts::new(
                "plaudit_stats_cache_misses_total",
                "Global stats rebuilt from a full scan"
            ),
            registry
        )
        .expect("failed to register stats_cache_misses counter");

        // Exponential buckets covering 0.5 ms to ~1 s.
        let store_latency_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "plaudit_store_latency_ms",
                "Store interaction latency in milliseconds"
            )
            .buckets(
                prometheus::exponential_buckets(0.5, 2.0, 12)
                    .expect("valid bucket parameters")
            ),
            registry
        )
        .expect("failed to register store_latency_ms histogram");

        Self {
            registry,
            requests,
            endorsements_created,
            endorsements_updated,
            endorsements_removed,
            stats_cache_hits,
            stats_cache_misses,
            store_latency_ms,
        }
    }

    pub fn record_request(&self, operation: &str, outcome: &str) {
        self.requests.with_label_values(&[operation, outcome]).inc();
    }

    /// Encode every metric in the text exposition format.
    pub fn encode(&self) -> Result<String, NodeError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| NodeError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| NodeError::Metrics(e.to_string()))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}
