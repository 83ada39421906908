use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec, TextEncoder};

// Prometheus metrics (default registry)
pub static GATE_DECISIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tenant_gate_decisions_total",
        "Request gate decisions by route class and outcome",
        &["class", "outcome"]
    )
    .expect("register gate_decisions_total")
});

pub static AUTH_OUTCOMES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tenant_gate_auth_outcomes_total",
        "Authentication attempts by mechanism and outcome",
        &["mechanism", "outcome"]
    )
    .expect("register auth_outcomes_total")
});

pub static RATE_LIMITED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tenant_gate_rate_limited_total",
        "Total requests rejected by rate limiter"
    )
    .expect("register rate_limited_total")
});

pub fn record_gate(class: &str, outcome: &str) {
    GATE_DECISIONS_TOTAL.with_label_values(&[class, outcome]).inc();
}

pub fn record_auth(mechanism: &str, success: bool) {
    AUTH_OUTCOMES_TOTAL.with_label_values(&[mechanism, if success { "success" } else { "failure" }]).inc();
}

pub fn encode_metrics() -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (
        StatusCode::OK,
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

pub async fn metrics_handler() -> Response {
    let (status, body) = encode_metrics();
    (status, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response()
}
