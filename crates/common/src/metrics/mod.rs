//! Metrics and observability utilities
//!
//! Prometheus-friendly metric names for the agent loop, retrieval,
//! generation calls and the HTTP surface.

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use std::time::Instant;

/// Metrics prefix for all AskForge metrics
pub const METRICS_PREFIX: &str = "askforge";

/// Histogram buckets for end-to-end agent latency (in seconds).
/// Dominated by generation calls, so the range is wide.
pub const AGENT_LATENCY_BUCKETS: &[f64] = &[
    0.100, 0.250, 0.500, 1.000, 2.000, 4.000, 8.000, 15.00, 30.00, 60.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_agent_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total questions handled by the agent loop"
    );

    describe_counter!(
        format!("{}_agent_actions_total", METRICS_PREFIX),
        Unit::Count,
        "Actions recorded in agent traces, by action tag"
    );

    describe_histogram!(
        format!("{}_agent_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end agent latency in seconds"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Retrieval latency in seconds, by source"
    );

    describe_gauge!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of chunks returned by the last hybrid retrieval"
    );

    describe_counter!(
        format!("{}_generation_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Language model calls, by call shape and status"
    );

    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Language model call latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_counter!(
        format!("{}_http_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_http_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
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
            format!("{}_http_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_http_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record one finished agent query and the actions it took
pub fn record_agent_query(duration_secs: f64, actions: &[&str]) {
    counter!(format!("{}_agent_queries_total", METRICS_PREFIX)).increment(1);

    for action in actions {
        counter!(
            format!("{}_agent_actions_total", METRICS_PREFIX),
            "action" => action.to_string()
        )
        .increment(1);
    }

    histogram!(format!("{}_agent_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Record one retrieval call against a single source
pub fn record_retrieval(duration_secs: f64, source: &str, result_count: usize) {
    histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .record(duration_secs);

    if source == "hybrid" {
        gauge!(format!("{}_retrieval_results_count", METRICS_PREFIX)).set(result_count as f64);
    }
}

/// Record one language model call
pub fn record_generation(duration_secs: f64, call: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_generation_requests_total", METRICS_PREFIX),
        "call" => call.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        "call" => call.to_string()
    )
    .record(duration_secs);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    tracing::debug!(model, batch_size, duration_secs, success, "Embedding request finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in AGENT_LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: every helper must be a no-op.
        let metrics = RequestMetrics::start("POST", "/v1/ask");
        metrics.finish(200);
        record_agent_query(0.5, &["ANSWER_ACCEPTED"]);
        record_retrieval(0.01, "hybrid", 3);
        record_generation(0.2, "answer", true);
        record_embedding(0.1, "mock-embedding", 4, false);
    }
}
