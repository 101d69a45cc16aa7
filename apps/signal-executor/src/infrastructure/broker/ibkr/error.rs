//! IBKR-specific error types.

use thiserror::Error;

use crate::application::ports::VenueError;
use crate::infrastructure::broker::session::SessionError;

/// Errors from the IBKR Client Portal adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IbkrError {
    /// Transport failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Gateway returned an error body.
    #[error("Order rejected: {message}")]
    OrderRejected {
        /// Gateway message.
        message: String,
    },

    /// Confirmation questions kept coming.
    #[error("Order still unconfirmed after {rounds} reply rounds")]
    UnconfirmedOrder {
        /// Rounds answered.
        rounds: u32,
    },

    /// No contract id for a symbol.
    #[error("No contract id for {symbol}")]
    UnknownContract {
        /// Local symbol.
        symbol: String,
    },

    /// Gateway answered with something unexpected.
    #[error("Unexpected gateway response: {0}")]
    UnexpectedResponse(String),

    /// Missing account id.
    #[error("IBKR account id is required")]
    MissingAccount,
}

impl From<IbkrError> for VenueError {
    fn from(err: IbkrError) -> Self {
        match err {
            IbkrError::OrderRejected { message } => Self::Rejected {
                code: "ORDER_REJECTED".to_string(),
                message,
            },
            IbkrError::UnconfirmedOrder { rounds } => Self::Rejected {
                code: "UNCONFIRMED".to_string(),
                message: format!("unconfirmed after {rounds} reply rounds"),
            },
            IbkrError::UnknownContract { symbol } => Self::Rejected {
                code: "UNKNOWN_CONTRACT".to_string(),
                message: symbol,
            },
            IbkrError::UnexpectedResponse(message) => Self::Decode { message },
            IbkrError::MissingAccount => Self::Auth {
                message: "missing IBKR account id".to_string(),
            },
            IbkrError::Session(session) => session.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_is_state_divergence() {
        let venue: VenueError = IbkrError::OrderRejected {
            message: "Order already filled".to_string(),
        }
        .into();
        assert!(venue.is_state_divergence());
    }

    #[test]
    fn session_not_found_passes_through() {
        let venue: VenueError = IbkrError::Session(SessionError::NotFound {
            path: "/iserver/account/DU1/order/9".to_string(),
            body: String::new(),
        })
        .into();
        assert!(matches!(venue, VenueError::NotFound { .. }));
    }
}
