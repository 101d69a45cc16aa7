//! Trade Signal Bounded Context
//!
//! Inbound instructions to open, modify or close a logical trade.

mod trade_signal;

pub use trade_signal::{ContractType, SignalAction, SignalType, TradeSignal};
