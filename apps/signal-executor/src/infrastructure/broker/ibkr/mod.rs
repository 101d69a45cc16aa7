//! IBKR Client Portal venue adapter
//!
//! Order-only venue behind the Client Portal gateway. Stop-loss and
//! take-profit are placed as standalone orders; precautionary order
//! questions are confirmed automatically.

mod adapter;
mod api_types;
mod config;
mod error;

pub use adapter::IbkrVenue;
pub use config::{DEFAULT_GATEWAY_URL, IbkrConfig};
pub use error::IbkrError;
