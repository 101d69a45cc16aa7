//! Application Layer
//!
//! Orchestrates domain logic:
//!
//! - **Ports**: Interfaces to the venue and the audit sink
//! - **Use Cases**: Handling one trade signal
//! - **Services**: Per-channel sequencing of signals

pub mod ports;
pub mod services;
pub mod use_cases;

pub use ports::*;
pub use services::*;
pub use use_cases::*;
