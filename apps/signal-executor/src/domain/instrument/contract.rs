//! Venue contract descriptor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Asset class of a resolved instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetClass {
    /// Spot currency pair.
    Cash,
    /// Commodity quoted against a currency (metals).
    Commodity,
}

impl AssetClass {
    /// Security type code understood by IB-style venues.
    #[must_use]
    pub const fn sec_type(&self) -> &'static str {
        match self {
            Self::Cash => "CASH",
            Self::Commodity => "CMDTY",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sec_type())
    }
}

/// Venue-specific description of the instrument a signal trades.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractDescriptor {
    /// Asset class.
    pub asset_class: AssetClass,
    /// Venue symbol (`EUR` for a currency pair, `XAUUSD` for a commodity).
    pub symbol: String,
    /// Quote currency.
    pub currency: String,
    /// Exchange routing destination.
    pub routing_venue: String,
    /// Concatenated pair (`EURUSD`), as used by single-name venues.
    pub local_symbol: String,
}
