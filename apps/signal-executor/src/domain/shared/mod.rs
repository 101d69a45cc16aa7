//! Shared Domain Types
//!
//! Identifiers shared across the signal, instrument and tracked-order contexts.

pub mod identifiers;

pub use identifiers::{BrokerOrderId, BrokerPositionId, ChannelId, SignalOrderId};
