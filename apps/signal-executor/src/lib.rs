// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Signal Executor - Rust Core Library
//!
//! Turns trade signals (OPEN, MODIFICATION, CLOSE) into venue operations and
//! keeps a local record of the broker orders each signal chain created.
//!
//! # Architecture (Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Signals, contracts, order templates, tracked orders
//!   - `signal`: `TradeSignal` wire format
//!   - `instrument`: Ticker → contract resolution
//!   - `order_template`: Per-intent order specs and the side table
//!   - `tracked_order`: Tracked-order records and the `OrderStore` port
//!
//! - **Application**: Orchestration
//!   - `ports`: `VenuePort`, `AuditSink`
//!   - `use_cases`: `SignalHandler` with position/pending-order fallback
//!   - `services`: `ChannelDispatcher` (one sequential worker per channel)
//!
//! - **Infrastructure**: Adapters
//!   - `broker`: MetaApi, IBKR Client Portal and paper venues
//!   - `persistence`: In-memory and Redis order stores
//!   - `http`: Signal intake REST API

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Layers
// =============================================================================

/// Domain layer - Core business types with no external dependencies.
pub mod domain;

/// Application layer - Use cases, services and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Configuration loading and validation.
pub mod config;

/// Metrics and audit logging.
pub mod observability;

/// Tracing subscriber setup.
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

// Domain re-exports
pub use domain::instrument::{ContractDescriptor, ContractResolver, ContractTable};
pub use domain::order_template::{OrderSpec, OrderTemplates};
pub use domain::shared::{BrokerOrderId, BrokerPositionId, ChannelId, SignalOrderId};
pub use domain::signal::{SignalType, TradeSignal};
pub use domain::tracked_order::{OrderKey, OrderRole, OrderStore, TrackedOrder, TrackedStatus};

// Application re-exports
pub use application::ports::{AuditSink, ExitModel, InMemoryAuditLog, VenueError, VenuePort};
pub use application::services::{ChannelDispatcher, DispatchError, DispatcherConfig};
pub use application::use_cases::{SignalError, SignalHandler, SignalOutcome};

// Infrastructure re-exports
pub use infrastructure::broker::{IbkrVenue, MetaApiVenue, PaperVenue};
pub use infrastructure::http::{AppState, create_router};
pub use infrastructure::persistence::{InMemoryOrderStore, RedisOrderStore};
