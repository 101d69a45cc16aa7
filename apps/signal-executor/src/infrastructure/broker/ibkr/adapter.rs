//! IBKR Client Portal venue adapter implementing VenuePort.
//!
//! The Client Portal has no position-level protection: stop-loss and
//! take-profit are standing orders of their own, so the only primitives are
//! placing and cancelling orders.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::application::ports::{
    ExitModel, PlaceOrderRequest, Protection, VenueAck, VenueError, VenueOperation, VenuePort,
};
use crate::domain::instrument::ContractDescriptor;
use crate::domain::shared::{BrokerOrderId, BrokerPositionId};
use crate::infrastructure::broker::session::VenueSession;

use super::api_types::{
    IbkrCancelResponse, IbkrConid, IbkrOrder, IbkrOrderReply, IbkrOrderResponse,
    IbkrOrdersRequest, IbkrReplyRequest, IbkrSecdefEntry,
};
use super::config::IbkrConfig;
use super::error::IbkrError;

/// IBKR Client Portal venue.
#[derive(Debug)]
pub struct IbkrVenue {
    session: VenueSession,
    config: IbkrConfig,
    conid_cache: RwLock<HashMap<String, i64>>,
}

impl IbkrVenue {
    /// Build the venue from configuration.
    pub fn new(config: IbkrConfig) -> Result<Self, IbkrError> {
        if config.account_id.is_empty() {
            return Err(IbkrError::MissingAccount);
        }
        let session = VenueSession::new("ibkr", &config.session_config())?;
        Ok(Self::with_session(session, config))
    }

    /// Build the venue over an established session.
    #[must_use]
    pub fn with_session(session: VenueSession, config: IbkrConfig) -> Self {
        let conid_cache = RwLock::new(config.conids.clone());
        Self {
            session,
            config,
            conid_cache,
        }
    }

    /// Contract id for a descriptor: configured table first, then a
    /// `secdef/search` lookup whose result is cached.
    async fn conid(&self, contract: &ContractDescriptor) -> Result<i64, IbkrError> {
        let cached = self
            .conid_cache
            .read()
            .ok()
            .and_then(|cache| cache.get(&contract.local_symbol).copied());
        if let Some(conid) = cached {
            return Ok(conid);
        }

        let path = format!("/iserver/secdef/search?symbol={}", contract.symbol);
        let entries: Vec<IbkrSecdefEntry> = self.session.get(&path).await?;
        let sec_type = contract.asset_class.sec_type();

        let conid = entries
            .iter()
            .filter(|entry| entry.offers(sec_type))
            .find_map(|entry| entry.conid.as_ref().and_then(IbkrConid::value))
            .ok_or_else(|| IbkrError::UnknownContract {
                symbol: contract.local_symbol.clone(),
            })?;

        tracing::info!(
            symbol = %contract.local_symbol,
            sec_type,
            conid,
            "Resolved IBKR contract id"
        );

        if let Ok(mut cache) = self.conid_cache.write() {
            cache.insert(contract.local_symbol.clone(), conid);
        }
        Ok(conid)
    }

    fn to_order(&self, request: &PlaceOrderRequest, conid: i64) -> Result<IbkrOrder, IbkrError> {
        let quantity = request.spec.quantity().to_f64().ok_or_else(|| {
            IbkrError::UnexpectedResponse(format!(
                "quantity {} not representable",
                request.spec.quantity()
            ))
        })?;

        Ok(IbkrOrder {
            conid,
            conidex: None,
            order_type: request.spec.order_type_code().to_string(),
            side: request.spec.side().to_string(),
            price: request.spec.price().and_then(|p| p.to_f64()),
            quantity,
            tif: self.config.time_in_force.clone(),
            c_oid: request.client_tag.clone(),
            listing_exchange: request.contract.routing_venue.clone(),
            referrer: Some(request.comment.clone()),
        })
    }

    /// Submit an order and answer confirmation questions until the gateway
    /// returns an order id.
    async fn submit(&self, order: IbkrOrder) -> Result<BrokerOrderId, IbkrError> {
        let body = IbkrOrdersRequest {
            orders: vec![order],
        };
        let mut response: IbkrOrderResponse =
            self.session.post(&self.config.orders_path(), &body).await?;
        let mut rounds = 0;

        loop {
            let replies = match response {
                IbkrOrderResponse::Error(body) => {
                    return Err(IbkrError::OrderRejected {
                        message: body.error,
                    });
                }
                IbkrOrderResponse::Replies(replies) => replies,
            };

            let mut question = None;
            for reply in replies {
                match reply {
                    IbkrOrderReply::Placed {
                        order_id,
                        order_status,
                    } => {
                        tracing::info!(order_id = %order_id, status = %order_status, "IBKR order placed");
                        return Ok(BrokerOrderId::new(order_id));
                    }
                    IbkrOrderReply::Question { id, message } => {
                        if question.is_none() {
                            question = Some((id, message));
                        }
                    }
                }
            }

            let Some((reply_id, message)) = question else {
                return Err(IbkrError::UnexpectedResponse(
                    "empty order response".to_string(),
                ));
            };

            if rounds >= self.config.max_reply_rounds {
                return Err(IbkrError::UnconfirmedOrder { rounds });
            }
            rounds += 1;

            tracing::debug!(reply_id = %reply_id, ?message, round = rounds, "Confirming IBKR order warning");
            response = self
                .session
                .post(
                    &format!("/iserver/reply/{reply_id}"),
                    &IbkrReplyRequest { confirmed: true },
                )
                .await?;
        }
    }
}

#[async_trait]
impl VenuePort for IbkrVenue {
    fn name(&self) -> &'static str {
        "ibkr"
    }

    fn exit_model(&self) -> ExitModel {
        ExitModel::SeparateLegs
    }

    fn position_for_order(&self, _order_id: &BrokerOrderId) -> Option<BrokerPositionId> {
        None
    }

    async fn place_order(&self, request: PlaceOrderRequest) -> Result<VenueAck, VenueError> {
        let conid = self.conid(&request.contract).await?;
        let order = self.to_order(&request, conid)?;

        tracing::info!(
            conid,
            order_type = %order.order_type,
            side = %order.side,
            price = ?order.price,
            quantity = order.quantity,
            client_order_id = %order.c_oid,
            "Placing IBKR order"
        );

        let order_id = self.submit(order).await?;
        Ok(VenueAck::for_order(order_id).with_status("Submitted", request.comment))
    }

    async fn modify_position(
        &self,
        _position_id: &BrokerPositionId,
        _protection: Protection,
    ) -> Result<VenueAck, VenueError> {
        Err(VenueError::Unsupported {
            operation: VenueOperation::ModifyPosition,
        })
    }

    async fn modify_pending_order(
        &self,
        _order_id: &BrokerOrderId,
        _price: Option<Decimal>,
        _protection: Protection,
    ) -> Result<VenueAck, VenueError> {
        Err(VenueError::Unsupported {
            operation: VenueOperation::ModifyPendingOrder,
        })
    }

    async fn close_position(&self, _position_id: &BrokerPositionId) -> Result<VenueAck, VenueError> {
        Err(VenueError::Unsupported {
            operation: VenueOperation::ClosePosition,
        })
    }

    async fn cancel_order(&self, order_id: &BrokerOrderId) -> Result<VenueAck, VenueError> {
        let response: IbkrCancelResponse = self
            .session
            .delete(&self.config.order_path(order_id.as_str()))
            .await
            .map_err(IbkrError::from)?;

        if let Some(error) = response.error {
            tracing::warn!(order_id = %order_id, error = %error, "IBKR cancel refused");
            return Err(IbkrError::OrderRejected { message: error }.into());
        }

        tracing::info!(order_id = %order_id, "IBKR order cancelled");
        Ok(VenueAck::for_order(order_id.clone())
            .with_status("Cancelled", response.msg.unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instrument::{ContractResolver, ContractTable};
    use crate::domain::order_template::{OrderSide, OrderSpec};
    use rust_decimal_macros::dec;

    fn venue() -> IbkrVenue {
        IbkrVenue::new(
            IbkrConfig::new("DU1")
                .with_base_url("http://127.0.0.1:1")
                .with_conid("EURUSD", 12_087_792),
        )
        .unwrap()
    }

    #[test]
    fn stop_leg_maps_to_stp_order() {
        let request = PlaceOrderRequest {
            contract: ContractTable::default().resolve("EUR.USD").unwrap(),
            spec: OrderSpec::StopLoss {
                side: OrderSide::Sell,
                stop_price: dec!(1.05),
                quantity: dec!(20000),
            },
            protection: Protection::default(),
            comment: "1.05 : 17".to_string(),
            client_tag: "17-STOPLOSS-x".to_string(),
        };

        let order = venue().to_order(&request, 12_087_792).unwrap();

        assert_eq!(order.order_type, "STP");
        assert_eq!(order.side, "SELL");
        assert_eq!(order.price, Some(1.05));
        assert_eq!(order.quantity, 20_000.0);
        assert_eq!(order.listing_exchange, "IDEALPRO");
        assert_eq!(order.tif, "GTC");
    }

    #[test]
    fn venue_shape() {
        let venue = venue();
        assert_eq!(venue.exit_model(), ExitModel::SeparateLegs);
        assert!(venue.position_for_order(&"1".into()).is_none());
    }

    #[tokio::test]
    async fn position_primitives_are_unsupported() {
        let err = venue().close_position(&"1".into()).await.unwrap_err();
        assert_eq!(
            err,
            VenueError::Unsupported {
                operation: VenueOperation::ClosePosition
            }
        );
    }

    #[test]
    fn missing_account_rejected() {
        let err = IbkrVenue::new(IbkrConfig::new("")).unwrap_err();
        assert_eq!(err, IbkrError::MissingAccount);
    }
}
