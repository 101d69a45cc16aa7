//! Domain Layer
//!
//! Pure types and rules: signals, instruments, order templates and the
//! tracked-order records with their store contract.

pub mod instrument;
pub mod order_template;
pub mod shared;
pub mod signal;
pub mod tracked_order;
