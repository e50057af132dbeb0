//! Metrics and observability utilities
//!
//! Provides Prometheus metrics for requests, pipeline runs,
//! individual stages, and backend calls.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all RagForge metrics
pub const METRICS_PREFIX: &str = "ragforge";

/// Buckets for backend and pipeline latency (in seconds).
/// Chat completions are slow, so these start at 100ms.
pub const BACKEND_BUCKETS: &[f64] = &[
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 60s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Pipeline metrics
    describe_counter!(
        format!("{}_pipeline_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Total pipeline runs by mode and outcome"
    );

    describe_histogram!(
        format!("{}_pipeline_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end pipeline latency in seconds"
    );

    describe_counter!(
        format!("{}_stage_outcomes_total", METRICS_PREFIX),
        Unit::Count,
        "Optional stage results, completed or fallback"
    );

    describe_counter!(
        format!("{}_chunks_retrieved_total", METRICS_PREFIX),
        Unit::Count,
        "Evidence chunks returned by retrieval"
    );

    describe_counter!(
        format!("{}_chunks_kept_total", METRICS_PREFIX),
        Unit::Count,
        "Evidence chunks kept after relevance filtering"
    );

    // Backend metrics
    describe_counter!(
        format!("{}_backend_calls_total", METRICS_PREFIX),
        Unit::Count,
        "Total chat-completion backend calls"
    );

    describe_histogram!(
        format!("{}_backend_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Chat-completion backend latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record a finished pipeline run
pub fn record_pipeline(duration_secs: f64, mode: &str, success: bool) {
    let outcome = if success { "success" } else { "error" };

    counter!(
        format!("{}_pipeline_runs_total", METRICS_PREFIX),
        "mode" => mode.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_pipeline_duration_seconds", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .record(duration_secs);
}

/// Record whether an optional stage completed or fell back
pub fn record_stage(stage: &str, completed: bool) {
    let outcome = if completed { "completed" } else { "fallback" };

    counter!(
        format!("{}_stage_outcomes_total", METRICS_PREFIX),
        "stage" => stage.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record how many chunks retrieval produced and how many survived filtering
pub fn record_chunks(retrieved: usize, kept: usize) {
    counter!(format!("{}_chunks_retrieved_total", METRICS_PREFIX)).increment(retrieved as u64);
    counter!(format!("{}_chunks_kept_total", METRICS_PREFIX)).increment(kept as u64);
}

/// Record a chat-completion backend call
pub fn record_backend_call(duration_secs: f64, backend: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_backend_calls_total", METRICS_PREFIX),
        "backend" => backend.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_backend_duration_seconds", METRICS_PREFIX),
        "backend" => backend.to_string()
    )
    .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in BACKEND_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: every helper must be a no-op
        let metrics = RequestMetrics::start("POST", "/v1/query");
        metrics.finish(200);
        record_pipeline(0.5, "advanced", true);
        record_stage("filter", false);
        record_chunks(3, 2);
        record_backend_call(0.2, "retrieval", true);
    }
}
