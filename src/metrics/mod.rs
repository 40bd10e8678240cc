//! Metrics module
//!
//! Prometheus counters for the login flow and the authorization filter.
//! The binary is short-lived, so nothing is exported over HTTP; the values
//! are available through `prometheus::gather()` for embedding callers.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, register_int_counter, CounterVec, Histogram,
    IntCounter,
};

lazy_static! {
    // Login metrics
    pub static ref CALLBACK_ATTEMPTS: CounterVec = register_counter_vec!(
        "authz_rag_callback_attempts_total",
        "Login callback requests by outcome",
        &["outcome"]  // "accepted", "state_mismatch", "missing_code", "token_invalid"
    ).unwrap();

    // Authorization metrics
    pub static ref AUTHZ_DECISIONS: CounterVec = register_counter_vec!(
        "authz_rag_authz_decisions_total",
        "Per-chunk authorization decisions",
        &["decision"]  // "allow", "deny", "public"
    ).unwrap();

    pub static ref AUTHZ_ERRORS: IntCounter = register_int_counter!(
        "authz_rag_authz_errors_total",
        "Policy checks that failed to produce a decision"
    ).unwrap();

    pub static ref RETRIEVE_DURATION: Histogram = register_histogram!(
        "authz_rag_retrieve_duration_seconds",
        "Filtered retrieval duration in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();
}

/// Record the outcome of one callback request
pub fn record_callback_attempt(outcome: &str) {
    CALLBACK_ATTEMPTS.with_label_values(&[outcome]).inc();
}

/// Record one authorization decision
pub fn record_authz_decision(decision: &str) {
    AUTHZ_DECISIONS.with_label_values(&[decision]).inc();
}

/// Record a failed policy check
pub fn record_authz_error() {
    AUTHZ_ERRORS.inc();
}

/// Record filtered retrieval duration
pub fn record_retrieve_duration(duration_secs: f64) {
    RETRIEVE_DURATION.observe(duration_secs);
}
