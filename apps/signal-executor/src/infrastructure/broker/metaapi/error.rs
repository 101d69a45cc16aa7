//! MetaApi-specific error types.

use thiserror::Error;

use crate::application::ports::VenueError;
use crate::infrastructure::broker::session::SessionError;

/// Errors from the MetaApi adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetaApiError {
    /// Transport failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Trade request returned a non-success result code.
    #[error("Trade rejected: [{numeric_code} {string_code}] {message}")]
    TradeRejected {
        /// Numeric MT code.
        numeric_code: i64,
        /// String MT code.
        string_code: String,
        /// Message.
        message: String,
    },

    /// Target position or order does not exist.
    #[error("Ticket not found: {ticket}")]
    TicketNotFound {
        /// Ticket id.
        ticket: String,
    },

    /// Missing credentials.
    #[error("MetaApi token and account id are required")]
    MissingCredentials,

    /// Request cannot be expressed as an MT5 trade.
    #[error("Invalid trade request: {0}")]
    InvalidRequest(String),
}

impl From<MetaApiError> for VenueError {
    fn from(err: MetaApiError) -> Self {
        match err {
            MetaApiError::TradeRejected {
                numeric_code,
                string_code,
                message,
            } => Self::Rejected {
                code: if string_code.is_empty() {
                    numeric_code.to_string()
                } else {
                    string_code
                },
                message,
            },
            MetaApiError::TicketNotFound { ticket } => Self::NotFound { id: ticket },
            MetaApiError::InvalidRequest(message) => Self::Rejected {
                code: "INVALID_REQUEST".to_string(),
                message,
            },
            MetaApiError::MissingCredentials => Self::Auth {
                message: "missing MetaApi credentials".to_string(),
            },
            MetaApiError::Session(session) => session.into(),
        }
    }
}
