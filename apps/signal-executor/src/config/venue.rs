//! Venue configuration: which adapter to build and how.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::ExitModel;
use crate::infrastructure::broker::RetryPolicy;
use crate::infrastructure::broker::ibkr::DEFAULT_GATEWAY_URL;
use crate::infrastructure::broker::metaapi::DEFAULT_REGION;

/// Supported venues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueKind {
    /// MetaApi (MT5).
    Metaapi,
    /// IBKR Client Portal.
    Ibkr,
    /// In-process paper venue.
    Paper,
}

impl VenueKind {
    /// Stable label, also the default store namespace.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Metaapi => "metaapi",
            Self::Ibkr => "ibkr",
            Self::Paper => "paper",
        }
    }
}

/// Venue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Adapter to use.
    #[serde(default = "default_kind")]
    pub kind: VenueKind,
    /// Quantity sent with every order, in venue units.
    #[serde(default = "default_lot_size")]
    pub lot_size: Decimal,
    /// Exit model of the paper venue.
    #[serde(default = "default_paper_exit_model")]
    pub paper_exit_model: ExitModel,
    /// Retry policy override for the venue HTTP session.
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    /// MetaApi settings.
    #[serde(default)]
    pub metaapi: MetaApiSettings,
    /// IBKR settings.
    #[serde(default)]
    pub ibkr: IbkrSettings,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            lot_size: default_lot_size(),
            paper_exit_model: default_paper_exit_model(),
            retry: None,
            metaapi: MetaApiSettings::default(),
            ibkr: IbkrSettings::default(),
        }
    }
}

/// MetaApi settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaApiSettings {
    /// API token.
    #[serde(default)]
    pub token: String,
    /// MetaTrader account id.
    #[serde(default)]
    pub account_id: String,
    /// Deployment region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Base URL override.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Broker symbol suffix.
    #[serde(default)]
    pub symbol_suffix: String,
    /// Request timeout in seconds.
    #[serde(default = "default_metaapi_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MetaApiSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            account_id: String::new(),
            region: default_region(),
            base_url: None,
            symbol_suffix: String::new(),
            timeout_secs: default_metaapi_timeout_secs(),
        }
    }
}

/// IBKR Client Portal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IbkrSettings {
    /// Brokerage account id.
    #[serde(default)]
    pub account_id: String,
    /// Gateway URL.
    #[serde(default = "default_gateway_url")]
    pub base_url: String,
    /// Known contract ids by local symbol.
    #[serde(default)]
    pub conids: HashMap<String, i64>,
    /// Accept the gateway's self-signed certificate.
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
    /// Maximum confirmation rounds per placement.
    #[serde(default = "default_reply_rounds")]
    pub max_reply_rounds: u32,
    /// Request timeout in seconds.
    #[serde(default = "default_ibkr_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IbkrSettings {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            base_url: default_gateway_url(),
            conids: HashMap::new(),
            accept_invalid_certs: true,
            max_reply_rounds: default_reply_rounds(),
            timeout_secs: default_ibkr_timeout_secs(),
        }
    }
}

const fn default_kind() -> VenueKind {
    VenueKind::Paper
}

fn default_lot_size() -> Decimal {
    Decimal::new(1, 2)
}

const fn default_paper_exit_model() -> ExitModel {
    ExitModel::Attached
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

const fn default_metaapi_timeout_secs() -> u64 {
    60
}

fn default_gateway_url() -> String {
    DEFAULT_GATEWAY_URL.to_string()
}

pub(crate) const fn default_true() -> bool {
    true
}

const fn default_reply_rounds() -> u32 {
    5
}

const fn default_ibkr_timeout_secs() -> u64 {
    30
}
