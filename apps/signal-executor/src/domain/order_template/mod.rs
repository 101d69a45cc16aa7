//! Order Template Bounded Context
//!
//! Pure translation of a trade signal plus an intent into a venue order
//! specification.

mod builder;
mod spec;

pub use builder::{OrderTemplates, TemplateError, side_for};
pub use spec::{EntryStyle, OrderIntent, OrderSide, OrderSpec};
