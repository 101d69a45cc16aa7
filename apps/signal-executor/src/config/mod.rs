//! Configuration module for the signal executor.
//!
//! YAML configuration with `${VAR}` / `${VAR:-default}` environment
//! interpolation and validation at load time.
//!
//! # Usage
//!
//! ```rust,ignore
//! use signal_executor::config::load_config;
//!
//! // Load from default path (config.yaml)
//! let config = load_config(None)?;
//!
//! // Load from custom path
//! let config = load_config(Some("config/signal-executor.yaml"))?;
//! ```

mod contracts;
mod observability;
mod server;
mod store;
mod venue;

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::services::DispatcherConfig;
use crate::domain::instrument::ContractTable;
use crate::infrastructure::broker::{IbkrConfig, MetaApiConfig};

pub use contracts::ContractsConfig;
pub use observability::{LoggingConfig, MetricsSettings, ObservabilityConfig};
pub use server::ServerConfig;
pub use store::{StoreConfig, StoreKind};
pub use venue::{IbkrSettings, MetaApiSettings, VenueConfig, VenueKind};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Venue configuration.
    #[serde(default)]
    pub venue: VenueConfig,
    /// Tracked-order store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Contract resolution configuration.
    #[serde(default)]
    pub contracts: ContractsConfig,
    /// Channel dispatcher configuration.
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Contract resolver built from the `contracts` section.
    #[must_use]
    pub fn contract_table(&self) -> ContractTable {
        ContractTable::new(
            &self.contracts.commodities,
            &self.contracts.commodity_venue,
            &self.contracts.fx_venue,
        )
    }

    /// MetaApi adapter configuration.
    #[must_use]
    pub fn metaapi(&self) -> MetaApiConfig {
        let settings = &self.venue.metaapi;
        let mut config = MetaApiConfig::new(&settings.token, &settings.account_id);
        config.region.clone_from(&settings.region);
        config.base_url.clone_from(&settings.base_url);
        config.symbol_suffix.clone_from(&settings.symbol_suffix);
        config.timeout = Duration::from_secs(settings.timeout_secs);
        match &self.venue.retry {
            Some(retry) => config.with_retry(retry.clone()),
            None => config,
        }
    }

    /// IBKR adapter configuration.
    #[must_use]
    pub fn ibkr(&self) -> IbkrConfig {
        let settings = &self.venue.ibkr;
        let mut config = IbkrConfig::new(&settings.account_id).with_base_url(&settings.base_url);
        config.conids.clone_from(&settings.conids);
        config.accept_invalid_certs = settings.accept_invalid_certs;
        config.max_reply_rounds = settings.max_reply_rounds;
        config.timeout = Duration::from_secs(settings.timeout_secs);
        match &self.venue.retry {
            Some(retry) => config.with_retry(retry.clone()),
            None => config,
        }
    }

    /// Store key namespace.
    #[must_use]
    pub fn store_namespace(&self) -> String {
        self.store
            .namespace
            .clone()
            .unwrap_or_else(|| self.venue.kind.as_str().to_string())
    }

    /// Metrics listen address, when the exporter is enabled.
    pub fn metrics_addr(&self) -> Result<Option<SocketAddr>, ConfigError> {
        let metrics = &self.observability.metrics;
        if !metrics.enabled {
            return Ok(None);
        }
        metrics.addr.parse().map(Some).map_err(|_| {
            ConfigError::ValidationError(format!(
                "observability.metrics.addr '{}' is not a socket address",
                metrics.addr
            ))
        })
    }
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("config.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map_or("", |m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.venue.lot_size <= rust_decimal::Decimal::ZERO {
        return Err(ConfigError::ValidationError(
            "venue.lot_size must be positive".to_string(),
        ));
    }

    match config.venue.kind {
        VenueKind::Metaapi => {
            let settings = &config.venue.metaapi;
            if settings.token.is_empty() || settings.account_id.is_empty() {
                return Err(ConfigError::ValidationError(
                    "venue.metaapi.token and venue.metaapi.account_id are required".to_string(),
                ));
            }
        }
        VenueKind::Ibkr => {
            if config.venue.ibkr.account_id.is_empty() {
                return Err(ConfigError::ValidationError(
                    "venue.ibkr.account_id is required".to_string(),
                ));
            }
        }
        VenueKind::Paper => {}
    }

    if config.store.kind == StoreKind::Redis
        && config.store.url.as_deref().is_none_or(str::is_empty)
    {
        return Err(ConfigError::ValidationError(
            "store.url is required for the redis store".to_string(),
        ));
    }

    if config.dispatcher.queue_depth == 0 {
        return Err(ConfigError::ValidationError(
            "dispatcher.queue_depth must be positive".to_string(),
        ));
    }

    let valid_formats = ["json", "pretty"];
    if !valid_formats.contains(&config.observability.logging.format.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "observability.logging.format must be one of: {valid_formats:?}"
        )));
    }

    config.metrics_addr()?;

    Ok(())
}
