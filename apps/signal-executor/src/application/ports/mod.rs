//! Application Ports (Driven)
//!
//! Ports define interfaces for the external systems signal handling talks to.
//! The order store port lives with its records in `domain::tracked_order`.

mod audit_port;
mod venue_port;

pub use audit_port::{AuditEvent, AuditSink, AuditTag, InMemoryAuditLog};
#[cfg(test)]
pub use venue_port::MockVenuePort;
pub use venue_port::{
    ExitModel, PlaceOrderRequest, Protection, VenueAck, VenueError, VenueOperation, VenuePort,
};
