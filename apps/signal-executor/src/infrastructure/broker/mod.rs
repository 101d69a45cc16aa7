//! Venue Adapters
//!
//! Implementations of `VenuePort` for the supported execution venues, plus
//! the shared HTTP session and retry policy they are built on.

pub mod ibkr;
pub mod metaapi;
pub mod paper;
pub mod retry;
pub mod session;

pub use ibkr::{IbkrConfig, IbkrError, IbkrVenue};
pub use metaapi::{MetaApiConfig, MetaApiError, MetaApiVenue};
pub use paper::PaperVenue;
pub use retry::RetryPolicy;
pub use session::{SessionConfig, SessionError, VenueSession};
