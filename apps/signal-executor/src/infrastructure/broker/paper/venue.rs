//! Simulated venue keeping an in-memory book of orders and positions.
//!
//! Market entries fill on placement; limit entries and protective legs stay
//! working until [`PaperVenue::fill`] is called. With the attached exit model
//! a fill opens a position carrying the order's ticket.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::application::ports::{
    ExitModel, PlaceOrderRequest, Protection, VenueAck, VenueError, VenueOperation, VenuePort,
};
use crate::domain::order_template::{EntryStyle, OrderSpec};
use crate::domain::shared::{BrokerOrderId, BrokerPositionId};

const FIRST_TICKET: u64 = 1000;

/// Lifecycle of a paper order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaperOrderStatus {
    /// Resting.
    Working,
    /// Executed.
    Filled,
    /// Cancelled.
    Cancelled,
}

/// A call received by the paper venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaperCall {
    /// Operation invoked.
    pub operation: VenueOperation,
    /// Order or position id the call targeted, or the client tag for placements.
    pub target: String,
}

#[derive(Debug, Clone)]
struct PaperOrder {
    spec: OrderSpec,
    price: Option<Decimal>,
    protection: Protection,
    status: PaperOrderStatus,
}

#[derive(Debug, Clone)]
struct PaperPosition {
    protection: Protection,
    open: bool,
}

#[derive(Debug, Default)]
struct PaperBook {
    next_ticket: u64,
    orders: HashMap<String, PaperOrder>,
    positions: HashMap<String, PaperPosition>,
    calls: Vec<PaperCall>,
    scripted_failures: VecDeque<(VenueOperation, VenueError)>,
}

impl PaperBook {
    fn ticket(&mut self) -> String {
        let ticket = FIRST_TICKET + self.next_ticket;
        self.next_ticket += 1;
        ticket.to_string()
    }

    fn observe(&mut self, operation: VenueOperation, target: &str) -> Result<(), VenueError> {
        self.calls.push(PaperCall {
            operation,
            target: target.to_string(),
        });
        let scripted = self
            .scripted_failures
            .iter()
            .position(|(op, _)| *op == operation);
        match scripted.and_then(|index| self.scripted_failures.remove(index)) {
            Some((_, err)) => Err(err),
            None => Ok(()),
        }
    }
}

/// Paper venue.
#[derive(Debug)]
pub struct PaperVenue {
    exit_model: ExitModel,
    book: Mutex<PaperBook>,
}

impl PaperVenue {
    /// Create a paper venue with the given exit model.
    #[must_use]
    pub fn new(exit_model: ExitModel) -> Self {
        Self {
            exit_model,
            book: Mutex::new(PaperBook::default()),
        }
    }

    fn book(&self) -> Result<MutexGuard<'_, PaperBook>, VenueError> {
        self.book.lock().map_err(|_| VenueError::Transport {
            message: "paper book lock poisoned".to_string(),
        })
    }

    /// Fill a working order. Returns the position opened, if any.
    pub fn fill(&self, order_id: &str) -> Option<BrokerPositionId> {
        let mut book = self.book().ok()?;
        let order = book.orders.get_mut(order_id)?;
        if order.status != PaperOrderStatus::Working {
            return None;
        }
        order.status = PaperOrderStatus::Filled;
        let protection = order.protection;
        let opens_position = matches!(order.spec, OrderSpec::Open { .. });

        if self.exit_model == ExitModel::Attached && opens_position {
            book.positions.insert(
                order_id.to_string(),
                PaperPosition {
                    protection,
                    open: true,
                },
            );
            tracing::debug!(order_id, "Paper order filled into position");
            return Some(BrokerPositionId::new(order_id));
        }
        tracing::debug!(order_id, "Paper order filled");
        None
    }

    /// Close a position as if stopped out at the venue.
    pub fn close_externally(&self, position_id: &str) -> bool {
        let Ok(mut book) = self.book() else {
            return false;
        };
        match book.positions.get_mut(position_id) {
            Some(position) if position.open => {
                position.open = false;
                true
            }
            _ => false,
        }
    }

    /// Fail the next call of `operation` with `error`.
    pub fn fail_next(&self, operation: VenueOperation, error: VenueError) {
        if let Ok(mut book) = self.book() {
            book.scripted_failures.push_back((operation, error));
        }
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<PaperCall> {
        self.book().map(|book| book.calls.clone()).unwrap_or_default()
    }

    /// Number of calls of one operation.
    pub fn call_count(&self, operation: VenueOperation) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    /// Status of an order.
    pub fn order_status(&self, order_id: &str) -> Option<PaperOrderStatus> {
        self.book().ok()?.orders.get(order_id).map(|o| o.status)
    }

    /// Price of an order (limit, stop or entry price).
    pub fn order_price(&self, order_id: &str) -> Option<Decimal> {
        self.book().ok()?.orders.get(order_id).and_then(|o| o.price)
    }

    /// Protection attached to a working order.
    pub fn order_protection(&self, order_id: &str) -> Option<Protection> {
        self.book().ok()?.orders.get(order_id).map(|o| o.protection)
    }

    /// Protection attached to an open position.
    pub fn position_protection(&self, position_id: &str) -> Option<Protection> {
        self.book()
            .ok()?
            .positions
            .get(position_id)
            .filter(|p| p.open)
            .map(|p| p.protection)
    }

    /// Whether a position is open.
    pub fn position_open(&self, position_id: &str) -> bool {
        self.book()
            .map(|book| book.positions.get(position_id).is_some_and(|p| p.open))
            .unwrap_or(false)
    }

    /// Ids of working orders.
    pub fn working_orders(&self) -> Vec<BrokerOrderId> {
        let Ok(book) = self.book() else {
            return Vec::new();
        };
        let mut ids: Vec<BrokerOrderId> = book
            .orders
            .iter()
            .filter(|(_, o)| o.status == PaperOrderStatus::Working)
            .map(|(id, _)| BrokerOrderId::new(id.as_str()))
            .collect();
        ids.sort();
        ids
    }

    fn require_attached(&self, operation: VenueOperation) -> Result<(), VenueError> {
        if self.exit_model == ExitModel::Attached {
            Ok(())
        } else {
            Err(VenueError::Unsupported { operation })
        }
    }
}

#[async_trait]
impl VenuePort for PaperVenue {
    fn name(&self) -> &'static str {
        "paper"
    }

    fn exit_model(&self) -> ExitModel {
        self.exit_model
    }

    fn position_for_order(&self, order_id: &BrokerOrderId) -> Option<BrokerPositionId> {
        match self.exit_model {
            ExitModel::Attached => Some(BrokerPositionId::new(order_id.as_str())),
            ExitModel::SeparateLegs => None,
        }
    }

    async fn place_order(&self, request: PlaceOrderRequest) -> Result<VenueAck, VenueError> {
        let mut book = self.book()?;
        book.observe(VenueOperation::PlaceOrder, &request.client_tag)?;

        let attached = self.exit_model == ExitModel::Attached;
        if attached && matches!(request.spec, OrderSpec::Close { .. }) {
            return Err(VenueError::Unsupported {
                operation: VenueOperation::PlaceOrder,
            });
        }

        let fills_now = matches!(
            request.spec,
            OrderSpec::Open {
                entry: EntryStyle::Market,
                ..
            } | OrderSpec::Close { .. }
        );
        let protection = if attached {
            request.protection
        } else {
            Protection::default()
        };

        let ticket = book.ticket();
        book.orders.insert(
            ticket.clone(),
            PaperOrder {
                spec: request.spec,
                price: request.spec.price(),
                protection,
                status: if fills_now {
                    PaperOrderStatus::Filled
                } else {
                    PaperOrderStatus::Working
                },
            },
        );

        tracing::info!(
            ticket = %ticket,
            intent = ?request.spec.intent(),
            side = %request.spec.side(),
            symbol = %request.contract.local_symbol,
            filled = fills_now,
            "Paper order accepted"
        );

        let ack = VenueAck::for_order(BrokerOrderId::new(ticket.as_str()));
        if fills_now && attached {
            book.positions.insert(
                ticket.clone(),
                PaperPosition {
                    protection,
                    open: true,
                },
            );
            return Ok(ack
                .with_position(BrokerPositionId::new(ticket))
                .with_status("FILLED", request.comment));
        }
        let status = if fills_now { "FILLED" } else { "WORKING" };
        Ok(ack.with_status(status, request.comment))
    }

    async fn modify_position(
        &self,
        position_id: &BrokerPositionId,
        protection: Protection,
    ) -> Result<VenueAck, VenueError> {
        self.require_attached(VenueOperation::ModifyPosition)?;
        let mut book = self.book()?;
        book.observe(VenueOperation::ModifyPosition, position_id.as_str())?;

        match book.positions.get_mut(position_id.as_str()) {
            Some(position) if position.open => {
                if protection.stop_loss.is_some() {
                    position.protection.stop_loss = protection.stop_loss;
                }
                if protection.take_profit.is_some() {
                    position.protection.take_profit = protection.take_profit;
                }
                Ok(VenueAck::default()
                    .with_position(position_id.clone())
                    .with_status("MODIFIED", "position modified"))
            }
            _ => Err(VenueError::NotFound {
                id: position_id.to_string(),
            }),
        }
    }

    async fn modify_pending_order(
        &self,
        order_id: &BrokerOrderId,
        price: Option<Decimal>,
        protection: Protection,
    ) -> Result<VenueAck, VenueError> {
        self.require_attached(VenueOperation::ModifyPendingOrder)?;
        let mut book = self.book()?;
        book.observe(VenueOperation::ModifyPendingOrder, order_id.as_str())?;

        let Some(order) = book.orders.get_mut(order_id.as_str()) else {
            return Err(VenueError::NotFound {
                id: order_id.to_string(),
            });
        };
        match order.status {
            PaperOrderStatus::Working => {
                if price.is_some() {
                    order.price = price;
                }
                if protection.stop_loss.is_some() {
                    order.protection.stop_loss = protection.stop_loss;
                }
                if protection.take_profit.is_some() {
                    order.protection.take_profit = protection.take_profit;
                }
                Ok(VenueAck::for_order(order_id.clone()).with_status("MODIFIED", "order modified"))
            }
            PaperOrderStatus::Filled => Err(VenueError::Rejected {
                code: "ORDER_FILLED".to_string(),
                message: format!("order {order_id} already filled"),
            }),
            PaperOrderStatus::Cancelled => Err(VenueError::NotFound {
                id: order_id.to_string(),
            }),
        }
    }

    async fn close_position(&self, position_id: &BrokerPositionId) -> Result<VenueAck, VenueError> {
        self.require_attached(VenueOperation::ClosePosition)?;
        let mut book = self.book()?;
        book.observe(VenueOperation::ClosePosition, position_id.as_str())?;

        match book.positions.get_mut(position_id.as_str()) {
            Some(position) if position.open => {
                position.open = false;
                Ok(VenueAck::default()
                    .with_position(position_id.clone())
                    .with_status("CLOSED", "position closed"))
            }
            _ => Err(VenueError::NotFound {
                id: position_id.to_string(),
            }),
        }
    }

    async fn cancel_order(&self, order_id: &BrokerOrderId) -> Result<VenueAck, VenueError> {
        let mut book = self.book()?;
        book.observe(VenueOperation::CancelOrder, order_id.as_str())?;

        let Some(order) = book.orders.get_mut(order_id.as_str()) else {
            return Err(VenueError::NotFound {
                id: order_id.to_string(),
            });
        };
        match order.status {
            PaperOrderStatus::Working => {
                order.status = PaperOrderStatus::Cancelled;
                Ok(VenueAck::for_order(order_id.clone()).with_status("CANCELLED", "order cancelled"))
            }
            PaperOrderStatus::Filled => Err(VenueError::Rejected {
                code: "ORDER_FILLED".to_string(),
                message: format!("order {order_id} already filled"),
            }),
            PaperOrderStatus::Cancelled => Err(VenueError::NotFound {
                id: order_id.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instrument::{ContractResolver, ContractTable};
    use crate::domain::order_template::OrderSide;
    use rust_decimal_macros::dec;

    fn open(entry: EntryStyle) -> PlaceOrderRequest {
        PlaceOrderRequest {
            contract: ContractTable::default().resolve("EURUSD").unwrap(),
            spec: OrderSpec::Open {
                side: OrderSide::Buy,
                entry,
                quantity: dec!(0.01),
            },
            protection: Protection::new(Some(dec!(1.05)), None),
            comment: "c".to_string(),
            client_tag: "t".to_string(),
        }
    }

    #[tokio::test]
    async fn market_entry_opens_position_on_attached_venue() {
        let venue = PaperVenue::new(ExitModel::Attached);

        let ack = venue.place_order(open(EntryStyle::Market)).await.unwrap();

        let position = ack.position_id.unwrap();
        assert_eq!(position.as_str(), ack.order_id.unwrap().as_str());
        assert!(venue.position_open(position.as_str()));
        assert_eq!(
            venue.position_protection(position.as_str()).unwrap().stop_loss,
            Some(dec!(1.05))
        );
    }

    #[tokio::test]
    async fn limit_entry_works_until_filled() {
        let venue = PaperVenue::new(ExitModel::Attached);
        let ack = venue
            .place_order(open(EntryStyle::Limit { price: dec!(1.1) }))
            .await
            .unwrap();
        let order_id = ack.order_id.unwrap();
        assert!(ack.position_id.is_none());

        let position = venue.fill(order_id.as_str()).unwrap();

        let err = venue
            .modify_pending_order(&order_id, None, Protection::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VenueError::Rejected { .. }));
        venue
            .modify_position(&position, Protection::new(None, Some(dec!(1.2))))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancel_semantics() {
        let venue = PaperVenue::new(ExitModel::SeparateLegs);
        let working = venue
            .place_order(open(EntryStyle::Limit { price: dec!(1.1) }))
            .await
            .unwrap()
            .order_id
            .unwrap();
        let filled = venue
            .place_order(open(EntryStyle::Market))
            .await
            .unwrap()
            .order_id
            .unwrap();

        venue.cancel_order(&working).await.unwrap();
        assert_eq!(
            venue.order_status(working.as_str()),
            Some(PaperOrderStatus::Cancelled)
        );
        assert!(matches!(
            venue.cancel_order(&filled).await,
            Err(VenueError::Rejected { .. })
        ));
        assert!(matches!(
            venue.cancel_order(&"nope".into()).await,
            Err(VenueError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn leg_venue_rejects_position_primitives() {
        let venue = PaperVenue::new(ExitModel::SeparateLegs);
        let err = venue
            .modify_position(&"1".into(), Protection::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            VenueError::Unsupported {
                operation: VenueOperation::ModifyPosition
            }
        );
        assert!(venue.position_for_order(&"1".into()).is_none());
    }

    #[tokio::test]
    async fn scripted_failure_applies_once() {
        let venue = PaperVenue::new(ExitModel::Attached);
        venue.fail_next(
            VenueOperation::PlaceOrder,
            VenueError::Transport {
                message: "timeout".to_string(),
            },
        );

        assert!(venue.place_order(open(EntryStyle::Market)).await.is_err());
        assert!(venue.place_order(open(EntryStyle::Market)).await.is_ok());
        assert_eq!(venue.call_count(VenueOperation::PlaceOrder), 2);
    }
}
