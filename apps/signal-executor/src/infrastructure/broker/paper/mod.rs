//! In-process paper venue for dry runs and tests.

mod venue;

pub use venue::{PaperCall, PaperOrderStatus, PaperVenue};
