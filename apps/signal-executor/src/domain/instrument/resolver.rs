//! Ticker to contract resolution.

use std::collections::HashSet;

use thiserror::Error;

use super::contract::{AssetClass, ContractDescriptor};

/// Default commodity routing destination.
pub const DEFAULT_COMMODITY_VENUE: &str = "SMART";

/// Default currency-pair routing destination.
pub const DEFAULT_FX_VENUE: &str = "IDEALPRO";

/// Contract resolution errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// Ticker could not be split into base and quote.
    #[error("Invalid ticker '{ticker}': expected BASE.QUOTE or a six-letter pair")]
    InvalidTicker {
        /// Offending ticker.
        ticker: String,
    },
}

/// Resolves raw tickers to venue contracts.
pub trait ContractResolver: Send + Sync {
    /// Resolve a ticker.
    fn resolve(&self, ticker: &str) -> Result<ContractDescriptor, ContractError>;
}

/// Table-driven resolver: configured commodity codes route to the commodity
/// venue, everything else is treated as a currency pair.
#[derive(Debug, Clone)]
pub struct ContractTable {
    commodity_codes: HashSet<String>,
    commodity_venue: String,
    fx_venue: String,
}

impl Default for ContractTable {
    fn default() -> Self {
        Self::new(["XAU"], DEFAULT_COMMODITY_VENUE, DEFAULT_FX_VENUE)
    }
}

impl ContractTable {
    /// Create a resolver table.
    pub fn new<I, S>(commodity_codes: I, commodity_venue: &str, fx_venue: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            commodity_codes: commodity_codes
                .into_iter()
                .map(|code| code.as_ref().to_uppercase())
                .collect(),
            commodity_venue: commodity_venue.to_string(),
            fx_venue: fx_venue.to_string(),
        }
    }

    /// Check whether a base asset is a configured commodity.
    #[must_use]
    pub fn is_commodity(&self, base: &str) -> bool {
        self.commodity_codes.contains(&base.to_uppercase())
    }

    fn split(ticker: &str) -> Option<(String, String)> {
        let trimmed = ticker.trim().to_uppercase();
        let parts: Vec<&str> = trimmed.split(['.', '/']).collect();

        match parts.as_slice() {
            [base, quote] if !base.is_empty() && !quote.is_empty() => {
                Some(((*base).to_string(), (*quote).to_string()))
            }
            [pair] if pair.len() == 6 && pair.chars().all(|c| c.is_ascii_alphabetic()) => {
                Some((pair[..3].to_string(), pair[3..].to_string()))
            }
            _ => None,
        }
    }
}

impl ContractResolver for ContractTable {
    fn resolve(&self, ticker: &str) -> Result<ContractDescriptor, ContractError> {
        let (base, quote) = Self::split(ticker).ok_or_else(|| ContractError::InvalidTicker {
            ticker: ticker.to_string(),
        })?;
        let local_symbol = format!("{base}{quote}");

        let descriptor = if self.is_commodity(&base) {
            ContractDescriptor {
                asset_class: AssetClass::Commodity,
                symbol: local_symbol.clone(),
                currency: quote,
                routing_venue: self.commodity_venue.clone(),
                local_symbol,
            }
        } else {
            ContractDescriptor {
                asset_class: AssetClass::Cash,
                symbol: base,
                currency: quote,
                routing_venue: self.fx_venue.clone(),
                local_symbol,
            }
        };

        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("EUR.USD", AssetClass::Cash, "EUR", "USD", "IDEALPRO", "EURUSD" ; "dotted pair")]
    #[test_case("GBPJPY", AssetClass::Cash, "GBP", "JPY", "IDEALPRO", "GBPJPY" ; "concatenated pair")]
    #[test_case("XAU.USD", AssetClass::Commodity, "XAUUSD", "USD", "SMART", "XAUUSD" ; "gold")]
    #[test_case("xau/usd", AssetClass::Commodity, "XAUUSD", "USD", "SMART", "XAUUSD" ; "lowercase slash")]
    fn resolves_default_table(
        ticker: &str,
        asset_class: AssetClass,
        symbol: &str,
        currency: &str,
        venue: &str,
        local: &str,
    ) {
        let contract = ContractTable::default().resolve(ticker).unwrap();

        assert_eq!(contract.asset_class, asset_class);
        assert_eq!(contract.symbol, symbol);
        assert_eq!(contract.currency, currency);
        assert_eq!(contract.routing_venue, venue);
        assert_eq!(contract.local_symbol, local);
    }

    #[test_case("" ; "empty")]
    #[test_case("EUR." ; "missing quote")]
    #[test_case("EURUSDX" ; "seven letters")]
    #[test_case("EUR.USD.X" ; "three parts")]
    fn rejects_malformed_tickers(ticker: &str) {
        let err = ContractTable::default().resolve(ticker).unwrap_err();
        assert!(matches!(err, ContractError::InvalidTicker { .. }));
    }

    #[test]
    fn extended_commodity_codes() {
        let table = ContractTable::new(["XAU", "xag"], "SMART", "IDEALPRO");

        let silver = table.resolve("XAG.USD").unwrap();

        assert_eq!(silver.asset_class, AssetClass::Commodity);
        assert_eq!(silver.symbol, "XAGUSD");
        assert!(table.is_commodity("xau"));
    }

    #[test]
    fn sec_type_codes() {
        assert_eq!(AssetClass::Cash.sec_type(), "CASH");
        assert_eq!(AssetClass::Commodity.to_string(), "CMDTY");
    }
}
