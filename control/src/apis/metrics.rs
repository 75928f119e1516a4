//! Controller metrics
//!
//! Node event handling, group enqueue and group reconciliation metrics.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

lazy_static! {
    /// Controller metrics registry
    pub static ref CONTROLLER_METRICS_REGISTRY: Registry = Registry::new();

    /// Node events received, by kind and whether they triggered a pass
    static ref NODE_EVENTS_TOTAL: IntCounterVec = {
        let opts = Opts::new(
            "rauta_node_events_total",
            "Total number of node events handled",
        );
        let counter = IntCounterVec::new(opts, &["event", "relevant"])
            .expect("Failed to create counter");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(counter.clone()))
            .expect("Failed to register counter");
        counter
    };

    /// Reconcile requests submitted, by the node event kind that caused them
    static ref GROUP_ENQUEUES_TOTAL: IntCounterVec = {
        let opts = Opts::new(
            "rauta_ingress_group_enqueues_total",
            "Total number of ingress group reconcile requests submitted",
        );
        let counter = IntCounterVec::new(opts, &["trigger"])
            .expect("Failed to create counter");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(counter.clone()))
            .expect("Failed to register counter");
        counter
    };

    /// Enqueue pass errors (list_failed, group_build_failed)
    static ref ENQUEUE_ERRORS_TOTAL: IntCounterVec = {
        let opts = Opts::new(
            "rauta_ingress_group_enqueue_errors_total",
            "Total number of errors raised while resolving impacted ingress groups",
        );
        let counter = IntCounterVec::new(opts, &["reason"])
            .expect("Failed to create counter");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(counter.clone()))
            .expect("Failed to register counter");
        counter
    };

    /// Duration of one impacted-group resolution pass
    static ref ENQUEUE_PASS_DURATION: HistogramVec = {
        let opts = HistogramOpts::new(
            "rauta_ingress_group_enqueue_pass_duration_seconds",
            "Impacted ingress group resolution pass duration in seconds",
        )
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500]);
        let histogram = HistogramVec::new(opts, &["trigger"])
            .expect("Failed to create histogram");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(histogram.clone()))
            .expect("Failed to register histogram");
        histogram
    };

    /// Ingress group reconciliations total
    static ref GROUP_RECONCILIATIONS_TOTAL: IntCounterVec = {
        let opts = Opts::new(
            "rauta_ingress_group_reconciliations_total",
            "Total number of ingress group reconciliations",
        );
        let counter = IntCounterVec::new(opts, &["kind", "result"])
            .expect("Failed to create counter");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(counter.clone()))
            .expect("Failed to register counter");
        counter
    };

    /// Ingress group reconciliation duration
    static ref GROUP_RECONCILIATION_DURATION: HistogramVec = {
        let opts = HistogramOpts::new(
            "rauta_ingress_group_reconciliation_duration_seconds",
            "Ingress group reconciliation duration in seconds",
        );
        let histogram = HistogramVec::new(opts, &["kind"])
            .expect("Failed to create histogram");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(histogram.clone()))
            .expect("Failed to register histogram");
        histogram
    };

    /// Requests waiting in the reconcile queue
    static ref QUEUE_DEPTH: IntGauge = {
        let gauge = IntGauge::new(
            "rauta_reconcile_queue_depth",
            "Current number of requests waiting in the reconcile queue",
        )
        .expect("Failed to create gauge");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(gauge.clone()))
            .expect("Failed to register gauge");
        gauge
    };

    /// Adds absorbed by an identical pending request
    static ref QUEUE_COALESCED_TOTAL: IntCounterVec = {
        let opts = Opts::new(
            "rauta_reconcile_queue_coalesced_total",
            "Total number of queue adds coalesced into an already pending request",
        );
        let counter = IntCounterVec::new(opts, &["state"])
            .expect("Failed to create counter");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(counter.clone()))
            .expect("Failed to register counter");
        counter
    };
}

/// Record a handled node event
pub fn record_node_event(event: &str, relevant: bool) {
    let relevant = if relevant { "true" } else { "false" };
    NODE_EVENTS_TOTAL
        .with_label_values(&[event, relevant])
        .inc();
}

/// Record one completed resolution pass and the requests it submitted
pub fn record_enqueue_pass(trigger: &str, enqueued: usize, duration_secs: f64) {
    ENQUEUE_PASS_DURATION
        .with_label_values(&[trigger])
        .observe(duration_secs);

    GROUP_ENQUEUES_TOTAL
        .with_label_values(&[trigger])
        .inc_by(enqueued as u64);
}

/// Record an error raised during a resolution pass
pub fn record_enqueue_error(reason: &str) {
    ENQUEUE_ERRORS_TOTAL.with_label_values(&[reason]).inc();
}

/// Record ingress group reconciliation
pub fn record_group_reconciliation(kind: &str, duration_secs: f64, result: &str) {
    GROUP_RECONCILIATION_DURATION
        .with_label_values(&[kind])
        .observe(duration_secs);

    GROUP_RECONCILIATIONS_TOTAL
        .with_label_values(&[kind, result])
        .inc();
}

/// Publish the current queue depth
pub fn set_queue_depth(depth: usize) {
    QUEUE_DEPTH.set(depth as i64);
}

/// Record an add that was absorbed (state: "pending" or "processing")
pub fn record_queue_coalesced(state: &str) {
    QUEUE_COALESCED_TOTAL.with_label_values(&[state]).inc();
}

/// Gather controller metrics
pub fn gather_controller_metrics() -> Result<String, String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = CONTROLLER_METRICS_REGISTRY.gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Failed to convert to UTF-8: {}", e))
}
