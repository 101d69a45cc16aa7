//! Venue Port (Driven Port)
//!
//! Interface for issuing trade commands to a brokerage execution venue.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::instrument::ContractDescriptor;
use crate::domain::order_template::OrderSpec;
use crate::domain::shared::{BrokerOrderId, BrokerPositionId};

/// How a venue represents stop-loss and take-profit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitModel {
    /// Levels are fields of the position / pending order (MT5).
    Attached,
    /// Levels are independent standing orders (IB).
    SeparateLegs,
}

/// Protective levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protection {
    /// Stop-loss level.
    pub stop_loss: Option<Decimal>,
    /// Take-profit level.
    pub take_profit: Option<Decimal>,
}

impl Protection {
    /// Create protection levels.
    #[must_use]
    pub const fn new(stop_loss: Option<Decimal>, take_profit: Option<Decimal>) -> Self {
        Self {
            stop_loss,
            take_profit,
        }
    }

    /// No level set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.stop_loss.is_none() && self.take_profit.is_none()
    }
}

/// Request to place a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    /// Instrument.
    pub contract: ContractDescriptor,
    /// Order specification.
    pub spec: OrderSpec,
    /// Attached levels; ignored by leg venues.
    pub protection: Protection,
    /// Free-text comment carried to the venue.
    pub comment: String,
    /// Client-side tag for idempotent placement.
    pub client_tag: String,
}

/// Synchronous venue acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueAck {
    /// Order id assigned or echoed by the venue.
    pub order_id: Option<BrokerOrderId>,
    /// Position id, when the operation produced or targeted one.
    pub position_id: Option<BrokerPositionId>,
    /// Venue result code.
    pub code: String,
    /// Venue result message.
    pub message: String,
}

impl VenueAck {
    /// Acknowledgement for an order.
    #[must_use]
    pub fn for_order(order_id: BrokerOrderId) -> Self {
        Self {
            order_id: Some(order_id),
            ..Self::default()
        }
    }

    /// Set the position id.
    #[must_use]
    pub fn with_position(mut self, position_id: BrokerPositionId) -> Self {
        self.position_id = Some(position_id);
        self
    }

    /// Set code and message.
    #[must_use]
    pub fn with_status(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.code = code.into();
        self.message = message.into();
        self
    }
}

/// Venue operation kind, used in audit records and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueOperation {
    /// `place_order`.
    PlaceOrder,
    /// `modify_position`.
    ModifyPosition,
    /// `modify_pending_order`.
    ModifyPendingOrder,
    /// `close_position`.
    ClosePosition,
    /// `cancel_order`.
    CancelOrder,
}

impl VenueOperation {
    /// Stable label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PlaceOrder => "place_order",
            Self::ModifyPosition => "modify_position",
            Self::ModifyPendingOrder => "modify_pending_order",
            Self::ClosePosition => "close_position",
            Self::CancelOrder => "cancel_order",
        }
    }
}

impl fmt::Display for VenueOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Venue port error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VenueError {
    /// Venue rejected the command.
    #[error("Venue rejected: [{code}] {message}")]
    Rejected {
        /// Venue result code.
        code: String,
        /// Venue message.
        message: String,
    },

    /// Target order or position does not exist.
    #[error("Not found at venue: {id}")]
    NotFound {
        /// Requested id.
        id: String,
    },

    /// The venue has no such primitive.
    #[error("Operation not supported by venue: {operation}")]
    Unsupported {
        /// Operation requested.
        operation: VenueOperation,
    },

    /// Network failure after retries.
    #[error("Venue transport error: {message}")]
    Transport {
        /// Error details.
        message: String,
    },

    /// Credentials refused.
    #[error("Venue authentication error: {message}")]
    Auth {
        /// Error details.
        message: String,
    },

    /// Response could not be decoded.
    #[error("Venue response decode error: {message}")]
    Decode {
        /// Error details.
        message: String,
    },
}

impl VenueError {
    /// Whether the error indicates local state diverged from the venue
    /// (the target exists in another form or not at all).
    #[must_use]
    pub const fn is_state_divergence(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::NotFound { .. })
    }

    /// Short kind label for metrics and audit payloads.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "rejected",
            Self::NotFound { .. } => "not_found",
            Self::Unsupported { .. } => "unsupported",
            Self::Transport { .. } => "transport",
            Self::Auth { .. } => "auth",
            Self::Decode { .. } => "decode",
        }
    }
}

/// Port for venue interactions. Each call is one logical round trip.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VenuePort: Send + Sync {
    /// Venue name, for logs and store namespacing.
    fn name(&self) -> &'static str;

    /// Exit model of the venue.
    fn exit_model(&self) -> ExitModel;

    /// Position id a fill of the pending order would produce, if the venue
    /// defines such a mapping.
    fn position_for_order(&self, order_id: &BrokerOrderId) -> Option<BrokerPositionId>;

    /// Place a new order.
    async fn place_order(&self, request: PlaceOrderRequest) -> Result<VenueAck, VenueError>;

    /// Change the protective levels of an open position.
    async fn modify_position(
        &self,
        position_id: &BrokerPositionId,
        protection: Protection,
    ) -> Result<VenueAck, VenueError>;

    /// Change price and protective levels of a pending order.
    async fn modify_pending_order(
        &self,
        order_id: &BrokerOrderId,
        price: Option<Decimal>,
        protection: Protection,
    ) -> Result<VenueAck, VenueError>;

    /// Close an open position.
    async fn close_position(
        &self,
        position_id: &BrokerPositionId,
    ) -> Result<VenueAck, VenueError>;

    /// Cancel a pending order.
    async fn cancel_order(&self, order_id: &BrokerOrderId) -> Result<VenueAck, VenueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divergence_kinds() {
        let rejected = VenueError::Rejected {
            code: "10036".to_string(),
            message: "position closed".to_string(),
        };
        let transport = VenueError::Transport {
            message: "timeout".to_string(),
        };

        assert!(rejected.is_state_divergence());
        assert!(!transport.is_state_divergence());
        assert_eq!(transport.kind(), "transport");
    }

    #[test]
    fn ack_builders() {
        let ack = VenueAck::for_order("11".into())
            .with_position("22".into())
            .with_status("10009", "Request completed");

        assert_eq!(ack.order_id, Some("11".into()));
        assert_eq!(ack.position_id, Some("22".into()));
        assert_eq!(ack.code, "10009");
    }

    #[test]
    fn unsupported_display_names_operation() {
        let err = VenueError::Unsupported {
            operation: VenueOperation::ModifyPosition,
        };
        assert_eq!(
            err.to_string(),
            "Operation not supported by venue: modify_position"
        );
    }
}
