//! MetaApi (MetaTrader 5) venue adapter
//!
//! Talks to the MetaApi client REST API trade endpoint:
//! - Market and pending entries with attached stop-loss / take-profit
//! - Position and pending-order modification, close and cancel by ticket
//! - Retries with short backoff while the terminal reconnects

mod adapter;
mod api_types;
mod config;
mod error;

pub use adapter::MetaApiVenue;
pub use config::{DEFAULT_REGION, MetaApiConfig};
pub use error::MetaApiError;
