//! Prometheus metrics for transaction propagation.
//!
//! All metrics follow the naming convention: `tx_<metric>_total`, labelled
//! by the backend kind (`rdbms`, `kv`, `distsql`, ...). Joins and routing
//! failures happen before a connection is chosen and carry the transactor's
//! group name instead.

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Transactions opened against a backend
    pub static ref TX_BEGUN: CounterVec = CounterVec::new(
        Opts::new("tx_begun_total", "Total transactions opened"),
        &["backend"]
    ).expect("metric creation failed");

    /// Transactions committed
    pub static ref TX_COMMITTED: CounterVec = CounterVec::new(
        Opts::new("tx_committed_total", "Total transactions committed"),
        &["backend"]
    ).expect("metric creation failed");

    /// Transactions rolled back, by reason
    pub static ref TX_ROLLED_BACK: CounterVec = CounterVec::new(
        Opts::new("tx_rolled_back_total", "Total transactions rolled back"),
        &["backend", "reason"]  // reason: error/panic/rollback_only/cancelled
    ).expect("metric creation failed");

    /// Units of work that joined an already active transaction
    pub static ref TX_JOINED: CounterVec = CounterVec::new(
        Opts::new("tx_joined_total", "Total units of work joining an active transaction"),
        &["backend"]
    ).expect("metric creation failed");

    /// Failures by stage
    pub static ref TX_FAILURES: CounterVec = CounterVec::new(
        Opts::new("tx_failures_total", "Transaction failures by stage"),
        &["backend", "stage"]  // stage: routing/begin/commit/rollback
    ).expect("metric creation failed");
}

/// Handle for the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(TX_BEGUN.clone()),
        Box::new(TX_COMMITTED.clone()),
        Box::new(TX_ROLLED_BACK.clone()),
        Box::new(TX_JOINED.clone()),
        Box::new(TX_FAILURES.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Record a transaction opened on `backend`.
pub fn record_begin(backend: &str) {
    TX_BEGUN.with_label_values(&[backend]).inc();
}

/// Record a successful commit on `backend`.
pub fn record_commit(backend: &str) {
    TX_COMMITTED.with_label_values(&[backend]).inc();
}

/// Record a rollback on `backend`.
pub fn record_rollback(backend: &str, reason: &str) {
    TX_ROLLED_BACK.with_label_values(&[backend, reason]).inc();
}

/// Record a unit of work that joined an active transaction.
pub fn record_join(backend: &str) {
    TX_JOINED.with_label_values(&[backend]).inc();
}

/// Record a failure at `stage`.
pub fn record_failure(backend: &str, stage: &str) {
    TX_FAILURES.with_label_values(&[backend, stage]).inc();
}
