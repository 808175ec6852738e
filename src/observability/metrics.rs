//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pipeline_connections_total` (counter): accepted client connections
//! - `pipeline_active_connections` (gauge): currently open connections
//! - `pipeline_connection_errors_total` (counter): handler or vend failures
//! - `pipeline_tasks_processed_total` (counter): tasks by queue, outcome
//! - `pipeline_task_queue_depth` (gauge): tasks stored in a queue after its last poll
//! - `pipeline_startup_duration_seconds` (histogram): time to listening
//! - `pipeline_version_timestamp_ms` (gauge): persisted data version

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Handle to the process-wide Prometheus recorder.
///
/// The first registry installs the recorder as the global `metrics`
/// recorder; every later registry renders from the same one.
#[derive(Clone)]
pub struct MetricsRegistry {
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    pub fn install() -> Self {
        let handle = HANDLE
            .get_or_init(|| {
                let recorder = PrometheusBuilder::new().build_recorder();
                let handle = recorder.handle();
                if metrics::set_global_recorder(recorder).is_err() {
                    tracing::warn!("Another metrics recorder is installed; /metrics will be empty");
                }
                handle
            })
            .clone();
        Self { handle }
    }

    /// Prometheus text exposition of every recorded series.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry").finish_non_exhaustive()
    }
}

pub fn record_connection_opened() {
    metrics::counter!("pipeline_connections_total").increment(1);
    metrics::gauge!("pipeline_active_connections").increment(1.0);
}

pub fn record_connection_closed() {
    metrics::gauge!("pipeline_active_connections").decrement(1.0);
}

pub fn record_connection_error(stage: &'static str) {
    metrics::counter!("pipeline_connection_errors_total", "stage" => stage).increment(1);
}

pub fn record_task(queue: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!(
        "pipeline_tasks_processed_total",
        "queue" => queue.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_queue_depth(queue: &str, depth: usize) {
    metrics::gauge!("pipeline_task_queue_depth", "queue" => queue.to_string()).set(depth as f64);
}

pub fn record_startup(started: Instant) {
    metrics::histogram!("pipeline_startup_duration_seconds").record(started.elapsed().as_secs_f64());
}
