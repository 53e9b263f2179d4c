/// Prometheus metrics for the prediction service.
///
/// All metrics live in one global registry and are exported in the
/// Prometheus text format from `GET /metrics`.
///
/// # Example
/// ```no_run
/// use ticket_triage::metrics::PREDICTIONS_TOTAL;
///
/// PREDICTIONS_TOTAL.with_label_values(&["Bug Report"]).inc();
/// ```

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use std::time::Duration;

const NAMESPACE: &str = "ticket_triage";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Successful predictions
    ///
    /// Labels: category
    pub static ref PREDICTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("predictions_total", "Total number of tickets classified")
            .namespace(NAMESPACE),
        &["category"]
    ).expect("Failed to create PREDICTIONS_TOTAL metric");

    /// Rejected or failed prediction requests
    ///
    /// Labels: code
    pub static ref PREDICTION_ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("prediction_errors_total", "Total number of failed prediction requests")
            .namespace(NAMESPACE),
        &["code"]
    ).expect("Failed to create PREDICTION_ERRORS_TOTAL metric");

    /// Time spent inside the inference engine per request
    ///
    /// Buckets: 0.0005 .. 1.0 seconds
    pub static ref PREDICTION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "prediction_duration_seconds",
            "Prediction latency in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
    ).expect("Failed to create PREDICTION_DURATION_SECONDS metric");
}

/// Register every metric with the global registry.
///
/// Call once at startup; a second call reports `AlreadyReg`.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(PREDICTIONS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PREDICTION_ERRORS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PREDICTION_DURATION_SECONDS.clone()))?;
    Ok(())
}

/// Export all registered metrics in Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Metrics output is not UTF-8: {}", e);
        String::new()
    })
}

/// Record a classified ticket
pub fn record_prediction(category: &str, elapsed: Duration) {
    PREDICTIONS_TOTAL.with_label_values(&[category]).inc();
    PREDICTION_DURATION_SECONDS.observe(elapsed.as_secs_f64());
}

/// Record a failed prediction request
pub fn record_prediction_error(code: &str) {
    PREDICTION_ERRORS_TOTAL.with_label_values(&[code]).inc();
}
