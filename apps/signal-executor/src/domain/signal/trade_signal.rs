//! Inbound trade signal.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::{ChannelId, SignalOrderId};

/// Direction of the trade a signal refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalAction {
    /// Long trade.
    Buy,
    /// Short trade.
    Sell,
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// How the entry order should be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractType {
    /// Execute immediately at the market.
    Market,
    /// Rest at the signal price.
    Limit,
}

/// Lifecycle step the signal asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    /// Open a new trade.
    Open,
    /// Change protective levels (or the entry price) of an existing trade.
    Modification,
    /// Exit an existing trade.
    Close,
}

impl SignalType {
    /// Stable label used for metrics and audit records.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Modification => "MODIFICATION",
            Self::Close => "CLOSE",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trade signal as delivered by the transport. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeSignal {
    /// Key correlating the open/modify/close chain of one logical trade.
    pub order_id: SignalOrderId,
    /// Channel the signal arrived on.
    pub channel_id: ChannelId,
    /// Raw ticker, e.g. `EUR.USD`.
    pub ticker: String,
    /// Trade direction.
    pub action: SignalAction,
    /// Entry execution style.
    pub contract_type: ContractType,
    /// Entry price (required for limit entries).
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Protective stop level.
    #[serde(default)]
    pub stop_loss: Option<Decimal>,
    /// Profit target level.
    #[serde(default)]
    pub take_profit: Option<Decimal>,
    /// Lifecycle step.
    #[serde(rename = "type")]
    pub kind: SignalType,
}

impl TradeSignal {
    /// Whether the signal carries any protective level.
    #[must_use]
    pub const fn has_protection(&self) -> bool {
        self.stop_loss.is_some() || self.take_profit.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn deserializes_wire_format() {
        let json = r#"{
            "orderId": 17,
            "channelId": "chan",
            "ticker": "EUR.USD",
            "action": "BUY",
            "contractType": "LIMIT",
            "price": 1.0712,
            "stopLoss": "1.0650",
            "type": "OPEN"
        }"#;

        let signal: TradeSignal = serde_json::from_str(json).unwrap();

        assert_eq!(signal.order_id.as_str(), "17");
        assert_eq!(signal.action, SignalAction::Buy);
        assert_eq!(signal.contract_type, ContractType::Limit);
        assert_eq!(signal.price, Some(dec!(1.0712)));
        assert_eq!(signal.stop_loss, Some(dec!(1.0650)));
        assert_eq!(signal.take_profit, None);
        assert_eq!(signal.kind, SignalType::Open);
        assert!(signal.has_protection());
    }

    #[test]
    fn close_signal_without_prices() {
        let json = r#"{
            "orderId": "2",
            "channelId": "chan",
            "ticker": "XAU.USD",
            "action": "SELL",
            "contractType": "MARKET",
            "type": "CLOSE"
        }"#;

        let signal: TradeSignal = serde_json::from_str(json).unwrap();

        assert_eq!(signal.kind, SignalType::Close);
        assert!(signal.price.is_none());
        assert!(!signal.has_protection());
    }

    #[test]
    fn signal_type_labels() {
        assert_eq!(SignalType::Open.to_string(), "OPEN");
        assert_eq!(SignalType::Modification.as_str(), "MODIFICATION");
        assert_eq!(SignalAction::Sell.to_string(), "SELL");
    }
}
