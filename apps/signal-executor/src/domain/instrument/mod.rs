//! Instrument Bounded Context
//!
//! Maps signal tickers onto venue contract descriptors.

mod contract;
mod resolver;

pub use contract::{AssetClass, ContractDescriptor};
pub use resolver::{
    ContractError, ContractResolver, ContractTable, DEFAULT_COMMODITY_VENUE, DEFAULT_FX_VENUE,
};
