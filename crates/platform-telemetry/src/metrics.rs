//! Prometheus metrics for platform components.
//!
//! All metrics follow the naming convention: `pc_<component>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // TOPOLOGY METRICS
    // =========================================================================

    /// Topic create calls issued
    pub static ref TOPICS_CREATED: Counter = Counter::new(
        "pc_topology_topics_created_total",
        "Total topic create calls issued to the broker"
    ).expect("metric creation failed");

    /// Queues provisioned (with DLQ and policies)
    pub static ref QUEUES_CREATED: Counter = Counter::new(
        "pc_topology_queues_created_total",
        "Total queues provisioned"
    ).expect("metric creation failed");

    /// Subscription provisioning outcomes
    pub static ref SUBSCRIPTIONS: CounterVec = CounterVec::new(
        Opts::new("pc_topology_subscriptions_total", "Subscription provisioning attempts"),
        &["outcome"]  // outcome: created/existing
    ).expect("metric creation failed");

    /// Topic id resolutions by source
    pub static ref TOPIC_LOOKUPS: CounterVec = CounterVec::new(
        Opts::new("pc_topology_topic_lookups_total", "Topic id resolutions"),
        &["source"]  // source: cache/listing
    ).expect("metric creation failed");

    // =========================================================================
    // MESSAGING METRICS
    // =========================================================================

    /// Events published
    pub static ref EVENTS_PUBLISHED: Counter = Counter::new(
        "pc_messaging_events_published_total",
        "Total events published"
    ).expect("metric creation failed");

    /// Publish failures (logged and swallowed)
    pub static ref PUBLISH_FAILURES: Counter = Counter::new(
        "pc_messaging_publish_failures_total",
        "Total publish attempts that failed"
    ).expect("metric creation failed");

    /// Messages received by consumers
    pub static ref MESSAGES_RECEIVED: Counter = Counter::new(
        "pc_messaging_messages_received_total",
        "Total messages received by queue consumers"
    ).expect("metric creation failed");

    /// Consumer cycle failures by stage
    pub static ref CONSUMER_FAILURES: CounterVec = CounterVec::new(
        Opts::new("pc_messaging_consumer_failures_total", "Consumer cycle failures"),
        &["stage"]  // stage: receive/delete/decode/handler
    ).expect("metric creation failed");

    // =========================================================================
    // SCOPE METRICS
    // =========================================================================

    /// Scope operations by kind
    pub static ref SCOPE_OPERATIONS: CounterVec = CounterVec::new(
        Opts::new("pc_scopes_operations_total", "Scope store operations"),
        &["operation"]  // operation: set/get/remove/touch/invalidate
    ).expect("metric creation failed");

    /// Lock acquisitions by outcome
    pub static ref LOCK_ACQUISITIONS: CounterVec = CounterVec::new(
        Opts::new("pc_scopes_lock_acquisitions_total", "Scope lock acquisitions"),
        &["outcome"]  // outcome: acquired/held
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Topology
        Box::new(TOPICS_CREATED.clone()),
        Box::new(QUEUES_CREATED.clone()),
        Box::new(SUBSCRIPTIONS.clone()),
        Box::new(TOPIC_LOOKUPS.clone()),
        // Messaging
        Box::new(EVENTS_PUBLISHED.clone()),
        Box::new(PUBLISH_FAILURES.clone()),
        Box::new(MESSAGES_RECEIVED.clone()),
        Box::new(CONSUMER_FAILURES.clone()),
        // Scopes
        Box::new(SCOPE_OPERATIONS.clone()),
        Box::new(LOCK_ACQUISITIONS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
