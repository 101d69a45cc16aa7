//! Tracing Setup
//!
//! Installs the global `tracing` subscriber: an `EnvFilter` (from `RUST_LOG`,
//! falling back to the configured level) and a JSON or pretty formatter.
//!
//! # Usage
//!
//! ```rust,ignore
//! use signal_executor::config::LoggingConfig;
//! use signal_executor::telemetry::init_tracing;
//!
//! init_tracing(&LoggingConfig::default())?;
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use crate::config::LoggingConfig;

/// Default filter when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_FILTER: &str = "signal_executor=info";

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter = env_filter(config);

    if config.format == "pretty" {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter)
            .with_target(true)
            .finish()
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(config.include_spans)
            .with_span_list(config.include_spans)
            .finish()
            .try_init()
    }
}
