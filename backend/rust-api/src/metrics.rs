use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_counter_vec,
    CounterVec, Encoder, HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Cache Metrics (Redis)
    pub static ref CACHE_HIT_RATIO: CounterVec = register_counter_vec!(
        "cache_hit_ratio",
        "Cache hit/miss ratio",
        &["result"]
    )
    .unwrap();

    // Business Metrics
    pub static ref SUBMISSIONS_GRADED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "submissions_graded_total",
        "Total number of graded exercise submissions",
        &["outcome", "graded_by"]
    )
    .unwrap();

    pub static ref STEPS_SERVED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "steps_served_total",
        "Total number of learning steps served",
        &["step_type"]
    )
    .unwrap();

    pub static ref HINTS_REQUESTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "hints_requested_total",
        "Total number of hints requested",
        &["hint_level"]
    )
    .unwrap();

    pub static ref GATE_REJECTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "gate_rejections_total",
        "Total number of agent requests rejected by a prerequisite gate",
        &["gate"]
    )
    .unwrap();

    pub static ref REMEDIAL_EXERCISES_TOTAL: IntCounter = register_int_counter!(
        "remedial_exercises_total",
        "Total number of remedial exercises generated"
    )
    .unwrap();

    pub static ref PARSER_RECOVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "parser_recoveries_total",
        "Total number of model responses that needed lenient parsing",
        &["stage"]
    )
    .unwrap();

    pub static ref CONTENT_GENERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "content_generations_total",
        "Total number of node content generations",
        &["status"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Record cache hit
pub fn record_cache_hit() {
    CACHE_HIT_RATIO.with_label_values(&["hit"]).inc();
}

/// Record cache miss
pub fn record_cache_miss() {
    CACHE_HIT_RATIO.with_label_values(&["miss"]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // Just verify that all metrics are properly registered
        let _ = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/health", "200"])
            .get();
        let _ = SUBMISSIONS_GRADED_TOTAL
            .with_label_values(&["perfect", "model"])
            .get();
    }

    #[test]
    fn test_render_metrics() {
        // Increment a counter to ensure we have some data
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let result = render_metrics();
        assert!(result.is_ok());
        let output = result.unwrap();
        assert!(output.contains("http_requests_total"));
    }
}
