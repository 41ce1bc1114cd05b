//! Prometheus metrics for the engagement pipeline.

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    TextEncoder,
};
use std::time::Duration;
use tracing::error;

static EVENTS_INGESTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "engagement_events_ingested_total",
        "Accepted engagement events by type",
        &["event_type"]
    )
    .expect("Failed to register events ingested metric")
});

static EVENTS_REJECTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "engagement_events_rejected_total",
        "Rejected engagement events by reason",
        &["reason"]
    )
    .expect("Failed to register events rejected metric")
});

static SWIPES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "engagement_swipes_total",
        "Swipe gestures processed by direction",
        &["direction"]
    )
    .expect("Failed to register swipes metric")
});

static INDEX_REFRESH_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "ranking_index_refresh_duration_seconds",
        "Duration of ranking index materialization sweeps",
        vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    )
    .expect("Failed to register index refresh duration metric")
});

static INDEX_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "ranking_index_entries",
        "Videos in the current ranking materialization"
    )
    .expect("Failed to register index entries metric")
});

static ACTIVE_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("swipe_sessions_active", "Live swipe sessions")
        .expect("Failed to register active sessions metric")
});

static VIEWS_FINALIZED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "engagement_views_finalized_total",
        "Abandoned views finalized by the watchdog"
    )
    .expect("Failed to register views finalized metric")
});

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "http_requests_total",
        "HTTP requests by method, path and status",
        &["method", "path", "status"]
    )
    .expect("Failed to register http requests metric")
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latency by method and path",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    )
    .expect("Failed to register http request duration metric")
});

pub fn record_event(event_type: &str) {
    EVENTS_INGESTED_TOTAL.with_label_values(&[event_type]).inc();
}

pub fn record_reject(reason: &str) {
    EVENTS_REJECTED_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_swipe(direction: &str) {
    SWIPES_TOTAL.with_label_values(&[direction]).inc();
}

pub fn record_index_refresh(entries: usize, duration: Duration) {
    INDEX_REFRESH_DURATION_SECONDS.observe(duration.as_secs_f64());
    INDEX_ENTRIES.set(entries as i64);
}

pub fn set_active_sessions(count: i64) {
    ACTIVE_SESSIONS.set(count);
}

pub fn record_views_finalized(count: u64) {
    VIEWS_FINALIZED_TOTAL.inc_by(count);
}

pub fn observe_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// GET /metrics
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return HttpResponse::InternalServerError().finish();
    }
    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
