//! IBKR Client Portal adapter configuration.

use std::collections::HashMap;
use std::time::Duration;

use crate::infrastructure::broker::retry::RetryPolicy;
use crate::infrastructure::broker::session::SessionConfig;

/// Default Client Portal gateway URL.
pub const DEFAULT_GATEWAY_URL: &str = "https://localhost:5000/v1/api";

/// Configuration for the IBKR Client Portal venue adapter.
#[derive(Debug, Clone)]
pub struct IbkrConfig {
    /// Brokerage account id.
    pub account_id: String,
    /// Gateway base URL.
    pub base_url: String,
    /// Known contract ids keyed by local symbol (`EURUSD` -> 12087792).
    pub conids: HashMap<String, i64>,
    /// Time in force for every order.
    pub time_in_force: String,
    /// Maximum confirmation rounds answered per placement.
    pub max_reply_rounds: u32,
    /// Accept the gateway's self-signed certificate.
    pub accept_invalid_certs: bool,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Retry policy.
    pub retry: RetryPolicy,
}

impl IbkrConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            conids: HashMap::new(),
            time_in_force: "GTC".to_string(),
            max_reply_rounds: 5,
            accept_invalid_certs: true,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    /// Set the gateway URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Register a known contract id.
    #[must_use]
    pub fn with_conid(mut self, local_symbol: impl Into<String>, conid: i64) -> Self {
        self.conids.insert(local_symbol.into(), conid);
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Order placement path.
    #[must_use]
    pub fn orders_path(&self) -> String {
        format!("/iserver/account/{}/orders", self.account_id)
    }

    /// Single order path.
    #[must_use]
    pub fn order_path(&self, order_id: &str) -> String {
        format!("/iserver/account/{}/order/{order_id}", self.account_id)
    }

    pub(super) fn session_config(&self) -> SessionConfig {
        SessionConfig {
            base_url: self.base_url.clone(),
            headers: Vec::new(),
            timeout: self.timeout,
            retry: self.retry.clone(),
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_embed_account() {
        let config = IbkrConfig::new("DU123");

        assert_eq!(config.orders_path(), "/iserver/account/DU123/orders");
        assert_eq!(config.order_path("42"), "/iserver/account/DU123/order/42");
        assert_eq!(config.base_url, DEFAULT_GATEWAY_URL);
        assert!(config.session_config().accept_invalid_certs);
    }

    #[test]
    fn conid_table() {
        let config = IbkrConfig::new("DU1").with_conid("EURUSD", 12_087_792);
        assert_eq!(config.conids.get("EURUSD"), Some(&12_087_792));
    }
}
