//! HTTP/REST API adapter.
//!
//! Inbound adapter feeding signals into the channel dispatcher and exposing
//! tracked-order lookups.

mod controller;
mod request;
mod response;

pub use controller::{AppState, create_router};
pub use request::*;
pub use response::*;
