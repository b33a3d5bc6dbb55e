//! Prometheus metrics for the topic modelling service
//!
//! This module provides metrics tracking for:
//! - Loader: documents loaded, skipped and failed
//! - Training: runs per outcome and their duration
//! - API: requests per endpoint and status, request latency
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram, register_histogram_vec,
    CounterVec, Encoder, GaugeVec, Histogram, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all service metrics
struct ServiceMetrics {
    documents: CounterVec,
    trainings: CounterVec,
    training_duration: Histogram,
    models: GaugeVec,
    api_requests: CounterVec,
    api_duration: HistogramVec,
}

/// Global storage for service metrics
static SERVICE_METRICS: OnceLock<ServiceMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup.
/// If metric registration fails, subsequent metric operations become no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = knowledge_extractor::metrics::init_metrics() {
///     tracing::warn!(error = %e, "Metrics initialization failed");
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = ServiceMetrics {
        documents: register_counter_vec!(
            "knowledge_extractor_documents_total",
            "Documents processed by the loader, by outcome",
            &["outcome"]
        )?,
        trainings: register_counter_vec!(
            "knowledge_extractor_trainings_total",
            "Topic model training runs, by outcome",
            &["outcome"]
        )?,
        training_duration: register_histogram!(
            "knowledge_extractor_training_duration_seconds",
            "Time spent loading documents and training a topic model",
            vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]
        )?,
        models: register_gauge_vec!(
            "knowledge_extractor_models",
            "Registered topic models, by state",
            &["state"]
        )?,
        api_requests: register_counter_vec!(
            "knowledge_extractor_api_requests_total",
            "Total API requests by endpoint and status",
            &["endpoint", "status"]
        )?,
        api_duration: register_histogram_vec!(
            "knowledge_extractor_api_request_duration_seconds",
            "API request duration in seconds",
            &["endpoint"],
            vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
        )?,
    };

    SERVICE_METRICS
        .set(metrics)
        .map_err(|_| "Service metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    SERVICE_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record loader outcomes for one batch
pub fn record_documents(loaded: usize, skipped: usize, failed: usize) {
    let Some(m) = SERVICE_METRICS.get() else {
        return;
    };

    for (outcome, count) in [("loaded", loaded), ("skipped", skipped), ("failed", failed)] {
        if count > 0 {
            m.documents
                .with_label_values(&[outcome])
                .inc_by(count as f64);
        }
    }
}

/// Record the end of a training run
pub fn record_training(succeeded: bool, duration_secs: f64) {
    let Some(m) = SERVICE_METRICS.get() else {
        return;
    };

    let outcome = if succeeded { "trained" } else { "failed" };
    m.trainings.with_label_values(&[outcome]).inc();
    m.training_duration.observe(duration_secs);
}

/// Update the per-state model gauges
pub fn update_model_counts(training: usize, trained: usize, failed: usize) {
    if let Some(m) = SERVICE_METRICS.get() {
        m.models.with_label_values(&["training"]).set(training as f64);
        m.models.with_label_values(&["trained"]).set(trained as f64);
        m.models.with_label_values(&["failed"]).set(failed as f64);
    }
}

/// Record API request
pub fn record_api_request(endpoint: &str, status: u16, duration_secs: f64) {
    let Some(m) = SERVICE_METRICS.get() else {
        return;
    };

    let status_str = status.to_string();
    m.api_requests
        .with_label_values(&[endpoint, &status_str])
        .inc();
    m.api_duration
        .with_label_values(&[endpoint])
        .observe(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ensure_metrics_initialized() {
        let _ = init_metrics();
    }

    #[test]
    fn test_init_metrics() {
        let result = init_metrics();
        assert!(result.is_ok());

        // Second call should also be Ok (idempotent)
        let result2 = init_metrics();
        assert!(result2.is_ok());
    }

    #[test]
    fn test_encode_metrics() {
        ensure_metrics_initialized();
        record_documents(3, 1, 0);
        let text = encode_metrics().unwrap();
        assert!(text.contains("knowledge_extractor_") || text.is_empty());
    }

    #[test]
    fn test_recording_does_not_panic() {
        ensure_metrics_initialized();
        record_training(true, 12.5);
        record_training(false, 0.5);
        update_model_counts(1, 2, 0);
        record_api_request("/topic_model", 200, 0.004);
    }
}
