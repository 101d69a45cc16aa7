//! Application Services
//!
//! Long-running coordination around the use cases.

mod channel_dispatcher;

pub use channel_dispatcher::{ChannelDispatcher, DispatchError, DispatcherConfig, PendingSignal};
