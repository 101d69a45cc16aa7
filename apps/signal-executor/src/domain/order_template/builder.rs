//! Table-driven order template builder.

use rust_decimal::Decimal;
use thiserror::Error;

use super::spec::{EntryStyle, OrderIntent, OrderSide, OrderSpec};
use crate::domain::signal::{ContractType, SignalAction, TradeSignal};

/// Template construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The signal lacks the price field the intent needs.
    #[error("{intent:?} order requires '{field}' but the signal has none")]
    MissingPrice {
        /// Intent being built.
        intent: OrderIntent,
        /// Missing signal field.
        field: &'static str,
    },
    /// Lot size must be positive.
    #[error("Invalid lot size {0}")]
    InvalidLotSize(Decimal),
}

const SIDE_TABLE: [((OrderIntent, SignalAction), OrderSide); 8] = [
    ((OrderIntent::Open, SignalAction::Buy), OrderSide::Buy),
    ((OrderIntent::Open, SignalAction::Sell), OrderSide::Sell),
    ((OrderIntent::TakeProfit, SignalAction::Buy), OrderSide::Sell),
    ((OrderIntent::TakeProfit, SignalAction::Sell), OrderSide::Buy),
    ((OrderIntent::StopLoss, SignalAction::Buy), OrderSide::Sell),
    ((OrderIntent::StopLoss, SignalAction::Sell), OrderSide::Buy),
    ((OrderIntent::Close, SignalAction::Buy), OrderSide::Sell),
    ((OrderIntent::Close, SignalAction::Sell), OrderSide::Buy),
];

/// Look up the venue side for an intent on a trade in the given direction.
#[must_use]
pub fn side_for(intent: OrderIntent, action: SignalAction) -> OrderSide {
    SIDE_TABLE
        .iter()
        .find(|((i, a), _)| *i == intent && *a == action)
        .map_or(OrderSide::Buy, |(_, side)| *side)
}

type BuildFn = fn(&TradeSignal, Decimal) -> Result<OrderSpec, TemplateError>;

const BUILDERS: [(OrderIntent, BuildFn); 4] = [
    (OrderIntent::Open, build_open),
    (OrderIntent::TakeProfit, build_take_profit),
    (OrderIntent::StopLoss, build_stop_loss),
    (OrderIntent::Close, build_close),
];

fn build_open(signal: &TradeSignal, quantity: Decimal) -> Result<OrderSpec, TemplateError> {
    let entry = match signal.contract_type {
        ContractType::Market => EntryStyle::Market,
        ContractType::Limit => EntryStyle::Limit {
            price: signal.price.ok_or(TemplateError::MissingPrice {
                intent: OrderIntent::Open,
                field: "price",
            })?,
        },
    };

    Ok(OrderSpec::Open {
        side: side_for(OrderIntent::Open, signal.action),
        entry,
        quantity,
    })
}

fn build_take_profit(signal: &TradeSignal, quantity: Decimal) -> Result<OrderSpec, TemplateError> {
    let limit_price = signal.take_profit.ok_or(TemplateError::MissingPrice {
        intent: OrderIntent::TakeProfit,
        field: "takeProfit",
    })?;

    Ok(OrderSpec::TakeProfit {
        side: side_for(OrderIntent::TakeProfit, signal.action),
        limit_price,
        quantity,
    })
}

fn build_stop_loss(signal: &TradeSignal, quantity: Decimal) -> Result<OrderSpec, TemplateError> {
    let stop_price = signal.stop_loss.ok_or(TemplateError::MissingPrice {
        intent: OrderIntent::StopLoss,
        field: "stopLoss",
    })?;

    Ok(OrderSpec::StopLoss {
        side: side_for(OrderIntent::StopLoss, signal.action),
        stop_price,
        quantity,
    })
}

fn build_close(signal: &TradeSignal, quantity: Decimal) -> Result<OrderSpec, TemplateError> {
    Ok(OrderSpec::Close {
        side: side_for(OrderIntent::Close, signal.action),
        quantity,
    })
}

/// Builds order specs at a fixed lot size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTemplates {
    lot_size: Decimal,
}

impl OrderTemplates {
    /// Create a builder for the given lot size.
    pub fn new(lot_size: Decimal) -> Result<Self, TemplateError> {
        if lot_size <= Decimal::ZERO {
            return Err(TemplateError::InvalidLotSize(lot_size));
        }
        Ok(Self { lot_size })
    }

    /// Configured lot size.
    #[must_use]
    pub const fn lot_size(&self) -> Decimal {
        self.lot_size
    }

    /// Build the spec for an intent.
    pub fn build(
        &self,
        signal: &TradeSignal,
        intent: OrderIntent,
    ) -> Result<OrderSpec, TemplateError> {
        let build = BUILDERS
            .iter()
            .find(|(i, _)| *i == intent)
            .map_or(build_close as BuildFn, |(_, f)| *f);
        build(signal, self.lot_size)
    }
}
