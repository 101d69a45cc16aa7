//! Contract resolution configuration.

use serde::{Deserialize, Serialize};

use crate::domain::instrument::{DEFAULT_COMMODITY_VENUE, DEFAULT_FX_VENUE};

/// Contract resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// Base codes traded as commodities (`XAU`).
    #[serde(default = "default_commodities")]
    pub commodities: Vec<String>,
    /// Routing venue for commodities.
    #[serde(default = "default_commodity_venue")]
    pub commodity_venue: String,
    /// Routing venue for currency pairs.
    #[serde(default = "default_fx_venue")]
    pub fx_venue: String,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            commodities: default_commodities(),
            commodity_venue: default_commodity_venue(),
            fx_venue: default_fx_venue(),
        }
    }
}

fn default_commodities() -> Vec<String> {
    vec!["XAU".to_string()]
}

fn default_commodity_venue() -> String {
    DEFAULT_COMMODITY_VENUE.to_string()
}

fn default_fx_venue() -> String {
    DEFAULT_FX_VENUE.to_string()
}
