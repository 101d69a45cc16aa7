//! MetaApi adapter configuration.

use std::time::Duration;

use crate::infrastructure::broker::retry::RetryPolicy;
use crate::infrastructure::broker::session::SessionConfig;

/// Default MetaApi region.
pub const DEFAULT_REGION: &str = "new-york";

/// Configuration for the MetaApi (MT5) venue adapter.
#[derive(Debug, Clone)]
pub struct MetaApiConfig {
    /// API token.
    pub token: String,
    /// MetaTrader account id.
    pub account_id: String,
    /// Deployment region.
    pub region: String,
    /// Override for the client API base URL (tests, proxies).
    pub base_url: Option<String>,
    /// Suffix appended to symbols (`EURUSD` + `.m`).
    pub symbol_suffix: String,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Retry policy.
    pub retry: RetryPolicy,
}

impl MetaApiConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new(token: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            account_id: account_id.into(),
            region: DEFAULT_REGION.to_string(),
            base_url: None,
            symbol_suffix: String::new(),
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::metaapi(),
        }
    }

    /// Set the base URL override.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Client API base URL.
    #[must_use]
    pub fn client_api_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| {
            format!("https://mt-client-api-v1.{}.agiliumtrade.ai", self.region)
        })
    }

    /// Trade endpoint path.
    #[must_use]
    pub fn trade_path(&self) -> String {
        format!("/users/current/accounts/{}/trade", self.account_id)
    }

    pub(super) fn session_config(&self) -> SessionConfig {
        SessionConfig {
            base_url: self.client_api_url(),
            headers: vec![("auth-token".to_string(), self.token.clone())],
            timeout: self.timeout,
            retry: self.retry.clone(),
            accept_invalid_certs: false,
        }
    }
}
