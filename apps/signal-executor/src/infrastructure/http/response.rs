//! HTTP response DTOs.

use serde::{Deserialize, Serialize};

use crate::application::use_cases::SignalOutcome;

/// Response from signal submission.
#[derive(Debug, Clone, Serialize)]
pub struct SignalResponse {
    /// Whether the signal was carried out.
    pub ok: bool,
    /// Outcome, when handled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SignalOutcome>,
    /// Error, when not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorResponse>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status.
    pub status: String,
    /// Version.
    pub version: String,
    /// Venue the service trades on.
    pub venue: String,
    /// Channels with a running worker.
    pub channels: usize,
}

/// API error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiErrorResponse {
    /// Error without details.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }
}
