//! MetaApi (MT5) venue adapter implementing VenuePort.
//!
//! MT5 keeps stop-loss and take-profit on the position or pending order
//! itself, and a position inherits the ticket of the order that opened it.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::application::ports::{
    ExitModel, PlaceOrderRequest, Protection, VenueAck, VenueError, VenuePort,
};
use crate::domain::order_template::{EntryStyle, OrderSide, OrderSpec};
use crate::domain::shared::{BrokerOrderId, BrokerPositionId};
use crate::infrastructure::broker::session::{SessionError, VenueSession};

use super::api_types::{MetaApiErrorResponse, MetaApiTradeRequest, MetaApiTradeResponse};
use super::config::MetaApiConfig;
use super::error::MetaApiError;

/// MetaApi trade venue.
#[derive(Debug, Clone)]
pub struct MetaApiVenue {
    session: VenueSession,
    trade_path: String,
    symbol_suffix: String,
}

fn price(value: Decimal) -> Option<f64> {
    value.to_f64()
}

impl MetaApiVenue {
    /// Build the venue from configuration.
    pub fn new(config: &MetaApiConfig) -> Result<Self, MetaApiError> {
        if config.token.is_empty() || config.account_id.is_empty() {
            return Err(MetaApiError::MissingCredentials);
        }
        let session = VenueSession::new("metaapi", &config.session_config())?;
        Ok(Self::with_session(session, config))
    }

    /// Build the venue over an established session.
    #[must_use]
    pub fn with_session(session: VenueSession, config: &MetaApiConfig) -> Self {
        Self {
            session,
            trade_path: config.trade_path(),
            symbol_suffix: config.symbol_suffix.clone(),
        }
    }

    /// Translate a placement request into an MT5 trade.
    fn to_trade_request(&self, request: &PlaceOrderRequest) -> Result<MetaApiTradeRequest, MetaApiError> {
        let (action_type, open_price) = match request.spec {
            OrderSpec::Open {
                side,
                entry: EntryStyle::Market,
                ..
            } => (market_action(side), None),
            OrderSpec::Open {
                side,
                entry: EntryStyle::Limit { price },
                ..
            }
            | OrderSpec::TakeProfit {
                side,
                limit_price: price,
                ..
            } => (limit_action(side), Some(price)),
            OrderSpec::StopLoss {
                side, stop_price, ..
            } => (stop_action(side), Some(stop_price)),
            OrderSpec::Close { .. } => {
                return Err(MetaApiError::InvalidRequest(
                    "MT5 positions are closed by ticket, not by an opposing order".to_string(),
                ));
            }
        };

        Ok(MetaApiTradeRequest {
            action_type: action_type.to_string(),
            symbol: Some(format!("{}{}", request.contract.local_symbol, self.symbol_suffix)),
            volume: request.spec.quantity().to_f64(),
            open_price: open_price.and_then(price),
            stop_loss: request.protection.stop_loss.and_then(price),
            take_profit: request.protection.take_profit.and_then(price),
            comment: Some(request.comment.clone()),
            ..MetaApiTradeRequest::default()
        })
    }

    async fn trade(&self, request: &MetaApiTradeRequest, ticket: &str) -> Result<VenueAck, MetaApiError> {
        tracing::debug!(
            action_type = %request.action_type,
            symbol = ?request.symbol,
            ticket,
            "Sending MetaApi trade"
        );

        let response: MetaApiTradeResponse = self
            .session
            .post(&self.trade_path, request)
            .await
            .map_err(rejection_from_error_body)?;

        if response.is_success() {
            tracing::info!(
                action_type = %request.action_type,
                code = %response.string_code,
                order_id = ?response.order_id,
                position_id = ?response.position_id,
                "MetaApi trade accepted"
            );
            return Ok(VenueAck {
                order_id: response.order_id,
                position_id: response.position_id,
                code: response.numeric_code.to_string(),
                message: response.message,
            });
        }

        if response.is_not_found() {
            return Err(MetaApiError::TicketNotFound {
                ticket: ticket.to_string(),
            });
        }

        Err(MetaApiError::TradeRejected {
            numeric_code: response.numeric_code,
            string_code: response.string_code,
            message: response.message,
        })
    }
}

/// Non-2xx replies carry `{ error, message }`; keep the error class as the code.
fn rejection_from_error_body(err: SessionError) -> MetaApiError {
    match err {
        SessionError::Status { status, body } => {
            match serde_json::from_str::<MetaApiErrorResponse>(&body) {
                Ok(parsed) if !parsed.error.is_empty() => MetaApiError::TradeRejected {
                    numeric_code: i64::from(status),
                    string_code: parsed.error,
                    message: parsed.message,
                },
                _ => SessionError::Status { status, body }.into(),
            }
        }
        other => other.into(),
    }
}

const fn market_action(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "ORDER_TYPE_BUY",
        OrderSide::Sell => "ORDER_TYPE_SELL",
    }
}

const fn limit_action(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "ORDER_TYPE_BUY_LIMIT",
        OrderSide::Sell => "ORDER_TYPE_SELL_LIMIT",
    }
}

const fn stop_action(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "ORDER_TYPE_BUY_STOP",
        OrderSide::Sell => "ORDER_TYPE_SELL_STOP",
    }
}

#[async_trait]
impl VenuePort for MetaApiVenue {
    fn name(&self) -> &'static str {
        "metaapi"
    }

    fn exit_model(&self) -> ExitModel {
        ExitModel::Attached
    }

    fn position_for_order(&self, order_id: &BrokerOrderId) -> Option<BrokerPositionId> {
        Some(BrokerPositionId::new(order_id.as_str()))
    }

    async fn place_order(&self, request: PlaceOrderRequest) -> Result<VenueAck, VenueError> {
        let trade = self.to_trade_request(&request)?;

        tracing::info!(
            symbol = ?trade.symbol,
            action_type = %trade.action_type,
            volume = ?trade.volume,
            comment = %request.comment,
            "Placing MetaApi order"
        );

        Ok(self.trade(&trade, &request.client_tag).await?)
    }

    async fn modify_position(
        &self,
        position_id: &BrokerPositionId,
        protection: Protection,
    ) -> Result<VenueAck, VenueError> {
        let trade = MetaApiTradeRequest {
            action_type: "POSITION_MODIFY".to_string(),
            position_id: Some(position_id.to_string()),
            stop_loss: protection.stop_loss.and_then(price),
            take_profit: protection.take_profit.and_then(price),
            ..MetaApiTradeRequest::default()
        };
        Ok(self.trade(&trade, position_id.as_str()).await?)
    }

    async fn modify_pending_order(
        &self,
        order_id: &BrokerOrderId,
        open_price: Option<Decimal>,
        protection: Protection,
    ) -> Result<VenueAck, VenueError> {
        let trade = MetaApiTradeRequest {
            action_type: "ORDER_MODIFY".to_string(),
            order_id: Some(order_id.to_string()),
            open_price: open_price.and_then(price),
            stop_loss: protection.stop_loss.and_then(price),
            take_profit: protection.take_profit.and_then(price),
            ..MetaApiTradeRequest::default()
        };
        Ok(self.trade(&trade, order_id.as_str()).await?)
    }

    async fn close_position(&self, position_id: &BrokerPositionId) -> Result<VenueAck, VenueError> {
        let trade = MetaApiTradeRequest {
            action_type: "POSITION_CLOSE_ID".to_string(),
            position_id: Some(position_id.to_string()),
            ..MetaApiTradeRequest::default()
        };
        Ok(self.trade(&trade, position_id.as_str()).await?)
    }

    async fn cancel_order(&self, order_id: &BrokerOrderId) -> Result<VenueAck, VenueError> {
        let trade = MetaApiTradeRequest {
            action_type: "ORDER_CANCEL".to_string(),
            order_id: Some(order_id.to_string()),
            ..MetaApiTradeRequest::default()
        };
        self.trade(&trade, order_id.as_str()).await.map_err(|err| {
            tracing::warn!(order_id = %order_id, error = %err, "MetaApi cancel failed");
            VenueError::from(err)
        })
    }
}
