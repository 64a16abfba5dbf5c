use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all Octavia metrics
const PREFIX: &str = "octavia";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Job Metrics
    pub static ref JOBS_STARTED_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_jobs_started_total"),
        "Total number of fetch jobs started"
    ).expect("Failed to create jobs_started_total metric");

    pub static ref JOBS_FINISHED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(format!("{PREFIX}_jobs_finished_total"), "Fetch jobs finished, by outcome"),
        &["outcome"]
    ).expect("Failed to create jobs_finished_total metric");

    pub static ref JOB_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_job_duration_seconds"),
            "Time from job start to its final outcome"
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["outcome"]
    ).expect("Failed to create job_duration_seconds metric");

    pub static ref ACTIVE_JOBS: IntGauge = IntGauge::new(
        format!("{PREFIX}_active_jobs"),
        "Number of fetch jobs currently running"
    ).expect("Failed to create active_jobs metric");

    // Streaming Metrics
    pub static ref STREAMED_BYTES_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_streamed_bytes_total"),
        "Total audio bytes streamed to clients"
    ).expect("Failed to create streamed_bytes_total metric");

    // Search Metrics
    pub static ref SEARCH_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(format!("{PREFIX}_search_requests_total"), "Catalog searches, by outcome"),
        &["outcome"]
    ).expect("Failed to create search_requests_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Already-registered errors are expected when tests call this repeatedly
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(JOBS_STARTED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(JOBS_FINISHED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(JOB_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(ACTIVE_JOBS.clone()));
    let _ = REGISTRY.register(Box::new(STREAMED_BYTES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SEARCH_REQUESTS_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Routes served by the API, the only values the `path` label may take besides "other".
const KNOWN_ENDPOINTS: &[&str] = &[
    "/",
    "/search",
    "/download",
    "/progress",
    "/stream",
    "/delete_audio",
    "/thumbnail-proxy",
];

/// Maps a request path onto a bounded set of metric labels.
pub fn categorize_endpoint(path: &str) -> &'static str {
    KNOWN_ENDPOINTS
        .iter()
        .find(|endpoint| **endpoint == path)
        .copied()
        .unwrap_or("other")
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

pub fn record_job_started() {
    JOBS_STARTED_TOTAL.inc();
    ACTIVE_JOBS.inc();
}

/// `outcome` is one of "ready", "error" or "orphaned".
pub fn record_job_finished(outcome: &str, duration: Duration) {
    ACTIVE_JOBS.dec();
    JOBS_FINISHED_TOTAL.with_label_values(&[outcome]).inc();
    JOB_DURATION_SECONDS
        .with_label_values(&[outcome])
        .observe(duration.as_secs_f64());
}

pub fn record_streamed_bytes(bytes: u64) {
    STREAMED_BYTES_TOTAL.inc_by(bytes);
}

pub fn record_search(outcome: &str) {
    SEARCH_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
}

pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
