//! Order store errors.

use thiserror::Error;

/// Errors raised by an order store backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Backend unreachable or command failed.
    #[error("Store backend error: {message}")]
    Backend {
        /// Backend message.
        message: String,
    },

    /// Stored document could not be (de)serialized.
    #[error("Store serialization error for '{key}': {message}")]
    Serialization {
        /// Document key.
        key: String,
        /// Serializer message.
        message: String,
    },

    /// In-process lock poisoned by a panicking writer.
    #[error("Store lock poisoned")]
    Poisoned,
}
