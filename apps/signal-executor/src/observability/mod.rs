//! Observability: Prometheus metrics and the tracing-backed audit sink.

mod audit;
mod metrics;

pub use audit::TracingAuditSink;
pub use self::metrics::{
    MetricsConfig, MetricsError, init_metrics, record_fallback, record_signal, record_venue_retry,
};
