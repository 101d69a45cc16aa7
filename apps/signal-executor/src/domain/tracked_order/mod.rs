//! Tracked Order Bounded Context
//!
//! Local record of the broker orders created for a signal chain, and the
//! store contract that owns those records.

mod errors;
mod record;
mod store;

pub use errors::StoreError;
pub use record::{OrderKey, OrderPatch, OrderRole, TrackedOrder, TrackedStatus};
pub use store::OrderStore;
