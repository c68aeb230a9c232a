//! Metrics module
//!
//! Provides Prometheus metrics for the ingestion pipeline and token gate.

pub mod server;

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    HistogramVec,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "r2_uploader_uploads_total",
        "Total number of uploads",
        &["source", "status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "r2_uploader_upload_bytes_total",
        "Total bytes uploaded to the object store"
    ).unwrap();

    pub static ref UPLOAD_DURATION: HistogramVec = register_histogram_vec!(
        "r2_uploader_upload_duration_seconds",
        "Object store put duration in seconds",
        &["bucket"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();

    // Fetch metrics
    pub static ref FETCH_BYTES_TOTAL: Counter = register_counter!(
        "r2_uploader_fetch_bytes_total",
        "Total bytes fetched from remote URLs"
    ).unwrap();

    pub static ref FETCHES_TOTAL: CounterVec = register_counter_vec!(
        "r2_uploader_fetches_total",
        "Remote fetch attempts",
        &["status"]
    ).unwrap();

    // Auth metrics
    pub static ref AUTH_ATTEMPTS: CounterVec = register_counter_vec!(
        "r2_uploader_auth_attempts_total",
        "Authentication attempts",
        &["status"]
    ).unwrap();

    pub static ref TOKEN_ROTATIONS: Counter = register_counter!(
        "r2_uploader_token_rotations_total",
        "Number of API token resets"
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "r2_uploader_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(source: &str, bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&[source, "success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload
pub fn record_upload_failure(source: &str) {
    UPLOADS_TOTAL.with_label_values(&[source, "failure"]).inc();
}

/// Record object store put duration
pub fn record_upload_duration(bucket: &str, duration_secs: f64) {
    UPLOAD_DURATION
        .with_label_values(&[bucket])
        .observe(duration_secs);
}

/// Record a completed remote fetch
pub fn record_fetch_success(bytes: u64) {
    FETCHES_TOTAL.with_label_values(&["success"]).inc();
    FETCH_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed remote fetch
pub fn record_fetch_failure() {
    FETCHES_TOTAL.with_label_values(&["failure"]).inc();
}

/// Record authentication attempt
pub fn record_auth_attempt(success: bool) {
    let status = if success { "success" } else { "failure" };
    AUTH_ATTEMPTS.with_label_values(&[status]).inc();
}

/// Record a token reset
pub fn record_token_rotation() {
    TOKEN_ROTATIONS.inc();
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}
