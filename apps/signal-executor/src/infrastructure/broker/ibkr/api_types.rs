//! IBKR Client Portal request/response types.

use serde::{Deserialize, Serialize};

/// Body for `POST /iserver/account/{id}/orders`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IbkrOrdersRequest {
    /// Orders to place.
    pub orders: Vec<IbkrOrder>,
}

/// One order ticket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IbkrOrder {
    /// Contract id.
    pub conid: i64,
    /// Security type with exchange (`12087792@IDEALPRO`), optional.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conidex: Option<String>,
    /// `MKT`, `LMT` or `STP`.
    pub order_type: String,
    /// `BUY` or `SELL`.
    pub side: String,
    /// Limit or stop price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Quantity.
    pub quantity: f64,
    /// Time in force.
    pub tif: String,
    /// Client order id.
    #[serde(rename = "cOID")]
    pub c_oid: String,
    /// Listing exchange.
    pub listing_exchange: String,
    /// Free-form reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

/// Body for `POST /iserver/reply/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IbkrReplyRequest {
    /// Always `true`.
    pub confirmed: bool,
}

/// One element of an order placement or reply response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IbkrOrderReply {
    /// Order accepted.
    Placed {
        /// Broker order id.
        order_id: String,
        /// Status text.
        #[serde(default)]
        order_status: String,
    },
    /// Precautionary question that must be confirmed.
    Question {
        /// Reply id.
        id: String,
        /// Warning text.
        #[serde(default)]
        message: Vec<String>,
    },
}

/// Placement and reply endpoints answer with a list or an error object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IbkrOrderResponse {
    /// Replies.
    Replies(Vec<IbkrOrderReply>),
    /// Error body.
    Error(IbkrErrorBody),
}

/// Error body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IbkrErrorBody {
    /// Error text.
    pub error: String,
}

/// Response from `DELETE /iserver/account/{id}/order/{order}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IbkrCancelResponse {
    /// Confirmation text.
    #[serde(default)]
    pub msg: Option<String>,
    /// Cancelled order id.
    #[serde(default)]
    pub order_id: Option<serde_json::Value>,
    /// Error text.
    #[serde(default)]
    pub error: Option<String>,
}

/// Contract id, sent by the gateway as either a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IbkrConid {
    /// Numeric form.
    Number(i64),
    /// String form.
    Text(String),
}

impl IbkrConid {
    /// Numeric value, if any.
    #[must_use]
    pub fn value(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.parse().ok(),
        }
    }
}

/// Entry in `GET /iserver/secdef/search` results.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IbkrSecdefEntry {
    /// Contract id.
    pub conid: Option<IbkrConid>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Tradable sections.
    #[serde(default)]
    pub sections: Vec<IbkrSecdefSection>,
}

impl IbkrSecdefEntry {
    /// Whether the entry lists the given security type.
    #[must_use]
    pub fn offers(&self, sec_type: &str) -> bool {
        self.sections.iter().any(|s| s.sec_type == sec_type)
    }
}

/// Security type section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IbkrSecdefSection {
    /// Security type.
    pub sec_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_serializes_client_order_id() {
        let order = IbkrOrder {
            conid: 12_087_792,
            conidex: None,
            order_type: "LMT".to_string(),
            side: "BUY".to_string(),
            price: Some(1.1),
            quantity: 20_000.0,
            tif: "GTC".to_string(),
            c_oid: "17-MAIN-abc".to_string(),
            listing_exchange: "IDEALPRO".to_string(),
            referrer: None,
        };

        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["cOID"], "17-MAIN-abc");
        assert_eq!(json["orderType"], "LMT");
        assert_eq!(json["listingExchange"], "IDEALPRO");
        assert!(json.get("conidex").is_none());
    }

    #[test]
    fn parses_placed_and_question_replies() {
        let placed: IbkrOrderResponse =
            serde_json::from_str(r#"[{"order_id":"1234","order_status":"Submitted"}]"#).unwrap();
        assert_eq!(
            placed,
            IbkrOrderResponse::Replies(vec![IbkrOrderReply::Placed {
                order_id: "1234".to_string(),
                order_status: "Submitted".to_string()
            }])
        );

        let question: IbkrOrderResponse = serde_json::from_str(
            r#"[{"id":"07a13a5a","message":["Price exceeds the Percentage constraint"],"isSuppressed":false}]"#,
        )
        .unwrap();
        assert!(matches!(
            question,
            IbkrOrderResponse::Replies(ref r) if matches!(r[0], IbkrOrderReply::Question { .. })
        ));
    }

    #[test]
    fn parses_error_body() {
        let err: IbkrOrderResponse = serde_json::from_str(r#"{"error":"Order rejected"}"#).unwrap();
        assert!(matches!(err, IbkrOrderResponse::Error(_)));
    }

    #[test]
    fn conid_accepts_both_forms() {
        let entries: Vec<IbkrSecdefEntry> = serde_json::from_str(
            r#"[{"conid":"12087792","sections":[{"secType":"CASH"}]},{"conid":69067924,"sections":[]}]"#,
        )
        .unwrap();

        assert_eq!(entries[0].conid.as_ref().and_then(IbkrConid::value), Some(12_087_792));
        assert!(entries[0].offers("CASH"));
        assert_eq!(entries[1].conid.as_ref().and_then(IbkrConid::value), Some(69_067_924));
    }
}
