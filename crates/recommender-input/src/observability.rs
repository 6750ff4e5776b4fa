//! Prometheus metrics for the reconciliation core

use prometheus::{
    register_histogram_vec, register_int_counter, register_int_gauge, HistogramVec, IntCounter,
    IntGauge,
};
use std::sync::OnceLock;

/// Histogram buckets for reconciliation pass latencies (in seconds)
const PASS_LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<FeederMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct FeederMetricsInner {
    pass_latency_seconds: HistogramVec,
    tracked_pods: IntGauge,
    tracked_targets: IntGauge,
    usage_samples_total: IntCounter,
    oom_facts_total: IntCounter,
    oom_events_dropped_total: IntCounter,
    checkpoints_loaded_total: IntCounter,
    checkpoints_deleted_total: IntCounter,
    watch_subscribes_total: IntCounter,
}

impl FeederMetricsInner {
    fn new() -> Self {
        Self {
            pass_latency_seconds: register_histogram_vec!(
                "recommender_pass_latency_seconds",
                "Time spent in one reconciliation pass",
                &["pass"],
                PASS_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register pass_latency_seconds"),

            tracked_pods: register_int_gauge!(
                "recommender_tracked_pods",
                "Number of pods currently tracked in the cluster model"
            )
            .expect("Failed to register tracked_pods"),

            tracked_targets: register_int_gauge!(
                "recommender_tracked_targets",
                "Number of autoscaling targets currently tracked in the cluster model"
            )
            .expect("Failed to register tracked_targets"),

            usage_samples_total: register_int_counter!(
                "recommender_usage_samples_total",
                "Total number of usage samples recorded"
            )
            .expect("Failed to register usage_samples_total"),

            oom_facts_total: register_int_counter!(
                "recommender_oom_facts_total",
                "Total number of OOM facts recorded"
            )
            .expect("Failed to register oom_facts_total"),

            oom_events_dropped_total: register_int_counter!(
                "recommender_oom_events_dropped_total",
                "Total number of pending OOM events evicted from the full queue"
            )
            .expect("Failed to register oom_events_dropped_total"),

            checkpoints_loaded_total: register_int_counter!(
                "recommender_checkpoints_loaded_total",
                "Total number of checkpoints merged into target initial state"
            )
            .expect("Failed to register checkpoints_loaded_total"),

            checkpoints_deleted_total: register_int_counter!(
                "recommender_checkpoints_deleted_total",
                "Total number of orphaned checkpoints garbage-collected"
            )
            .expect("Failed to register checkpoints_deleted_total"),

            watch_subscribes_total: register_int_counter!(
                "recommender_watch_subscribes_total",
                "Total number of eviction event subscriptions opened"
            )
            .expect("Failed to register watch_subscribes_total"),
        }
    }
}

/// Feeder metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct FeederMetrics {
    _private: (),
}

impl Default for FeederMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl FeederMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(FeederMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &FeederMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record the latency of one reconciliation pass
    pub fn observe_pass_latency(&self, pass: &str, duration_secs: f64) {
        self.inner()
            .pass_latency_seconds
            .with_label_values(&[pass])
            .observe(duration_secs);
    }

    /// Update tracked entity gauges
    pub fn set_tracked(&self, pods: i64, targets: i64) {
        self.inner().tracked_pods.set(pods);
        self.inner().tracked_targets.set(targets);
    }

    pub fn inc_usage_samples(&self, count: u64) {
        self.inner().usage_samples_total.inc_by(count);
    }

    pub fn inc_oom_facts(&self, count: u64) {
        self.inner().oom_facts_total.inc_by(count);
    }

    pub fn inc_oom_events_dropped(&self) {
        self.inner().oom_events_dropped_total.inc();
    }

    pub fn inc_checkpoints_loaded(&self) {
        self.inner().checkpoints_loaded_total.inc();
    }

    pub fn inc_checkpoints_deleted(&self) {
        self.inner().checkpoints_deleted_total.inc();
    }

    pub fn inc_watch_subscribes(&self) {
        self.inner().watch_subscribes_total.inc();
    }
}
