//! Prometheus metrics for signal execution.
//!
//! Counters and histograms are recorded through the `metrics` facade; they
//! are no-ops until [`init_metrics`] installs the exporter.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Configuration for the metrics exporter.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP listener.
    pub listen_addr: SocketAddr,
    /// Histogram buckets for signal handling latency (in seconds).
    pub latency_buckets: Vec<f64>,
}

impl MetricsConfig {
    /// Create a metrics configuration for an address with default buckets.
    #[must_use]
    pub fn with_addr(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            // 5ms to 30s: venue round trips with retries
            latency_buckets: vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
        }
    }
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to configure metrics exporter.
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    /// Failed to install metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

/// Initialize the Prometheus metrics exporter.
///
/// This starts an HTTP server that exposes metrics at `/metrics`.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .set_buckets(&config.latency_buckets)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(
        addr = %config.listen_addr,
        "Prometheus metrics exporter started"
    );

    Ok(())
}

/// Record a handled signal.
///
/// # Arguments
///
/// * `signal_type` - `OPEN`, `MODIFICATION` or `CLOSE`
/// * `outcome` - `ok`, `lookup_miss`, `failed`, ...
/// * `latency_seconds` - Time spent handling the signal
pub fn record_signal(signal_type: &str, outcome: &str, latency_seconds: f64) {
    counter!(
        "signals_total",
        "type" => signal_type.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        "signal_handle_seconds",
        "type" => signal_type.to_string()
    )
    .record(latency_seconds);
}

/// Record a fallback venue operation.
///
/// # Arguments
///
/// * `operation` - Fallback operation name
/// * `succeeded` - Whether the fallback was accepted
pub fn record_fallback(operation: &str, succeeded: bool) {
    counter!(
        "venue_fallbacks_total",
        "operation" => operation.to_string(),
        "result" => if succeeded { "ok" } else { "failed" }
    )
    .increment(1);
}

/// Record a venue transport retry.
pub fn record_venue_retry(venue: &str, attempt: u32) {
    counter!(
        "venue_retries_total",
        "venue" => venue.to_string(),
        "attempt" => attempt.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_exporter_is_noop() {
        record_signal("OPEN", "ok", 0.012);
        record_fallback("cancel_order", true);
        record_venue_retry("metaapi", 2);
    }

    #[test]
    fn config_with_addr() {
        let addr: SocketAddr = "127.0.0.1:9464".parse().unwrap();
        let config = MetricsConfig::with_addr(addr);

        assert_eq!(config.listen_addr, addr);
        assert!(config.latency_buckets.windows(2).all(|w| w[0] < w[1]));
    }
}
