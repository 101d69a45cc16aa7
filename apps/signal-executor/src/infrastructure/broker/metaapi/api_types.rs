//! MetaApi REST API request/response types.

use serde::{Deserialize, Serialize};

use crate::domain::shared::{BrokerOrderId, BrokerPositionId};

/// Trade request body for `POST /users/current/accounts/{id}/trade`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaApiTradeRequest {
    /// Action type (`ORDER_TYPE_BUY`, `POSITION_MODIFY`, ...).
    pub action_type: String,
    /// Symbol.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Volume in lots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    /// Pending order price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_price: Option<f64>,
    /// Stop-loss level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    /// Take-profit level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    /// Position id for position actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_id: Option<String>,
    /// Order id for pending order actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Comment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Trade response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaApiTradeResponse {
    /// Numeric MT result code.
    pub numeric_code: i64,
    /// String result code (`TRADE_RETCODE_DONE`).
    #[serde(default)]
    pub string_code: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Order ticket.
    #[serde(default)]
    pub order_id: Option<BrokerOrderId>,
    /// Position ticket.
    #[serde(default)]
    pub position_id: Option<BrokerPositionId>,
}

/// Numeric codes MT5 reports for accepted trade requests.
const SUCCESS_CODES: [i64; 6] = [0, 1, 10008, 10009, 10010, 10025];

/// Numeric codes meaning the target ticket no longer exists.
const NOT_FOUND_CODES: [i64; 2] = [10036, 4753];

impl MetaApiTradeResponse {
    /// Whether the request was accepted.
    #[must_use]
    pub fn is_success(&self) -> bool {
        SUCCESS_CODES.contains(&self.numeric_code)
    }

    /// Whether the target ticket was not found.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        NOT_FOUND_CODES.contains(&self.numeric_code)
    }
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct MetaApiErrorResponse {
    /// Error class (`ValidationError`, `NotFoundError`, ...).
    #[serde(default)]
    pub error: String,
    /// Message.
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_unset_fields() {
        let request = MetaApiTradeRequest {
            action_type: "POSITION_CLOSE_ID".to_string(),
            position_id: Some("46870472".to_string()),
            ..Default::default()
        };

        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"actionType": "POSITION_CLOSE_ID", "positionId": "46870472"})
        );
    }

    #[test]
    fn response_parses_codes_and_ids() {
        let response: MetaApiTradeResponse = serde_json::from_str(
            r#"{"numericCode":10009,"stringCode":"TRADE_RETCODE_DONE","message":"Request completed","orderId":"46870472","positionId":"46870472"}"#,
        )
        .unwrap();

        assert!(response.is_success());
        assert_eq!(response.order_id, Some("46870472".into()));
    }

    #[test]
    fn position_closed_is_not_found() {
        let response: MetaApiTradeResponse = serde_json::from_str(
            r#"{"numericCode":10036,"stringCode":"TRADE_RETCODE_POSITION_CLOSED","message":"Position closed"}"#,
        )
        .unwrap();

        assert!(!response.is_success());
        assert!(response.is_not_found());
    }
}
