//! Application Use Cases

mod handle_signal;

pub use handle_signal::{
    ExecutionPath, LegOutcome, LegResult, LookupCondition, SignalError, SignalHandler,
    SignalOutcome,
};
