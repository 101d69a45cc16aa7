//! Infrastructure Layer
//!
//! Adapters for the ports defined in the application and domain layers:
//!
//! - **Driven Adapters (Outbound)**
//!   - `broker/`: Venue adapters (MetaApi, IBKR Client Portal, paper)
//!   - `persistence/`: Tracked-order stores (in-memory, Redis)
//!
//! - **Driver Adapters (Inbound)**
//!   - `http/`: Signal intake and order lookup REST endpoints

pub mod broker;
pub mod http;
pub mod persistence;
