//! Order specification value types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side as sent to a venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    /// Buy.
    Buy,
    /// Sell.
    Sell,
}

impl OrderSide {
    /// The other side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Purpose of an order within a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderIntent {
    /// Entry order.
    Open,
    /// Profit-taking exit leg.
    TakeProfit,
    /// Protective stop exit leg.
    StopLoss,
    /// Flattening order.
    Close,
}

impl OrderIntent {
    /// All intents, in build order.
    pub const ALL: [Self; 4] = [Self::Open, Self::TakeProfit, Self::StopLoss, Self::Close];
}

/// Entry execution style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStyle {
    /// Market order.
    Market,
    /// Limit order at a price.
    Limit {
        /// Limit price.
        price: Decimal,
    },
}

/// Venue order specification, one variant per intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSpec {
    /// Entry order.
    Open {
        /// Side (same as the signal action).
        side: OrderSide,
        /// Market or limit.
        entry: EntryStyle,
        /// Lot size.
        quantity: Decimal,
    },
    /// Take-profit leg: opposite-side limit.
    TakeProfit {
        /// Side (opposite of the signal action).
        side: OrderSide,
        /// Target price.
        limit_price: Decimal,
        /// Lot size.
        quantity: Decimal,
    },
    /// Stop-loss leg: opposite-side stop.
    StopLoss {
        /// Side (opposite of the signal action).
        side: OrderSide,
        /// Trigger price.
        stop_price: Decimal,
        /// Lot size.
        quantity: Decimal,
    },
    /// Close: opposite-side market order for the full lot.
    Close {
        /// Side (opposite of the signal action).
        side: OrderSide,
        /// Lot size.
        quantity: Decimal,
    },
}

impl OrderSpec {
    /// Intent this spec was built for.
    #[must_use]
    pub const fn intent(&self) -> OrderIntent {
        match self {
            Self::Open { .. } => OrderIntent::Open,
            Self::TakeProfit { .. } => OrderIntent::TakeProfit,
            Self::StopLoss { .. } => OrderIntent::StopLoss,
            Self::Close { .. } => OrderIntent::Close,
        }
    }

    /// Order side.
    #[must_use]
    pub const fn side(&self) -> OrderSide {
        match self {
            Self::Open { side, .. }
            | Self::TakeProfit { side, .. }
            | Self::StopLoss { side, .. }
            | Self::Close { side, .. } => *side,
        }
    }

    /// Order quantity.
    #[must_use]
    pub const fn quantity(&self) -> Decimal {
        match self {
            Self::Open { quantity, .. }
            | Self::TakeProfit { quantity, .. }
            | Self::StopLoss { quantity, .. }
            | Self::Close { quantity, .. } => *quantity,
        }
    }

    /// Limit or trigger price, if the order carries one.
    #[must_use]
    pub const fn price(&self) -> Option<Decimal> {
        match self {
            Self::Open {
                entry: EntryStyle::Limit { price },
                ..
            } => Some(*price),
            Self::TakeProfit { limit_price, .. } => Some(*limit_price),
            Self::StopLoss { stop_price, .. } => Some(*stop_price),
            Self::Open { .. } | Self::Close { .. } => None,
        }
    }

    /// IB-style order type code (`MKT`, `LMT`, `STP`).
    #[must_use]
    pub const fn order_type_code(&self) -> &'static str {
        match self {
            Self::Open {
                entry: EntryStyle::Market,
                ..
            }
            | Self::Close { .. } => "MKT",
            Self::Open {
                entry: EntryStyle::Limit { .. },
                ..
            }
            | Self::TakeProfit { .. } => "LMT",
            Self::StopLoss { .. } => "STP",
        }
    }
}
