//! Prometheus Metrics Module
//!
//! Core counters and gauges of the matching engine
//!
//! ## Metric types
//! - **Counter**: events handled, matches, claim conflicts, failures
//! - **Histogram**: time spent inside a market's critical section
//! - **Gauge**: resting order-book depth per market and side
//!
//! ## Usage
//! ```rust,ignore
//! use pickup_matching::shared::metrics::METRICS;
//!
//! METRICS.events_total.with_label_values(&["request_created"]).inc();
//!
//! let timer = METRICS.matching_duration.with_label_values(&["PVG"]).start_timer();
//! // ... scan, rank, claim ...
//! timer.observe_duration();
//! ```

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Global metrics instance
    pub static ref METRICS: Metrics = Metrics::new();
}

pub struct Metrics {
    /// Events handled, by event type
    pub events_total: CounterVec,

    /// Committed matches, by airport and vehicle type
    pub matches_total: CounterVec,

    /// Claims refused because a candidate was already taken
    pub claim_conflicts_total: CounterVec,

    /// Failures, by kind (validation / persistence / publish / mirror_add / mirror_remove / lookup)
    pub failures_total: CounterVec,

    /// Seconds spent holding a market's write lock for one decision
    pub matching_duration: HistogramVec,

    /// Resting entries, by airport, vehicle type and side
    pub book_depth: GaugeVec,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            events_total: register_counter_vec!(
                "pickup_matching_events_total",
                "Total number of domain events handled",
                &["event_type"]
            )
            .expect("metric can be registered"),

            matches_total: register_counter_vec!(
                "pickup_matching_matches_total",
                "Total number of committed bookings",
                &["airport", "vehicle"]
            )
            .expect("metric can be registered"),

            claim_conflicts_total: register_counter_vec!(
                "pickup_matching_claim_conflicts_total",
                "Total number of claims lost to a concurrent handler",
                &["airport", "vehicle"]
            )
            .expect("metric can be registered"),

            failures_total: register_counter_vec!(
                "pickup_matching_failures_total",
                "Total number of failures by kind",
                &["kind"]
            )
            .expect("metric can be registered"),

            matching_duration: register_histogram_vec!(
                "pickup_matching_decision_duration_seconds",
                "Time spent inside a market critical section",
                &["airport"],
                vec![0.000_001, 0.000_005, 0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005]
            )
            .expect("metric can be registered"),

            book_depth: register_gauge_vec!(
                "pickup_matching_book_depth",
                "Current number of resting entries",
                &["airport", "vehicle", "side"]
            )
            .expect("metric can be registered"),
        }
    }

    /// Records a failure of the given kind
    pub fn failure(&self, kind: &str) {
        self.failures_total.with_label_values(&[kind]).inc();
    }

    /// Export in the Prometheus text format
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
