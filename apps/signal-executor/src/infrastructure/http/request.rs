//! HTTP request DTOs.

use serde::{Deserialize, Serialize};

use crate::domain::tracked_order::OrderRole;

/// Query string for `GET /v1/orders/{channel}/{order_id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQuery {
    /// Order role, case-insensitive. Defaults to `MAIN`.
    #[serde(default)]
    pub role: Option<String>,
}

impl OrderQuery {
    /// Parse the requested role.
    pub fn role(&self) -> Result<OrderRole, String> {
        self.role
            .as_deref()
            .map_or(Ok(OrderRole::Main), str::parse)
    }
}
