//! Audit Sink Port (Driven Port)
//!
//! Every decision point of signal handling is recorded here.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::domain::shared::{ChannelId, SignalOrderId};

/// Decision point tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditTag {
    /// OPEN handled.
    Open,
    /// MODIFICATION handled.
    Modification,
    /// CLOSE handled.
    Close,
    /// No live record for the signal chain.
    LookupMiss,
    /// Main order placement rejected.
    PlacementFailed,
    /// Exit leg placed and recorded.
    LegPlaced,
    /// Exit leg placement rejected.
    LegFailed,
    /// Exit leg cancelled.
    LegCancelled,
    /// Exit leg cancel or re-placement rejected.
    LegReplacementFailed,
    /// Primary venue operation rejected; fallback follows.
    PrimaryOperationFailed,
    /// Fallback venue operation succeeded.
    FallbackSucceeded,
    /// Fallback venue operation rejected or unavailable.
    FallbackFailed,
    /// Resolution, template or store failure.
    SignalFailed,
    /// Per-signal timing.
    HandleExecution,
}

impl AuditTag {
    /// Stable label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Modification => "MODIFICATION",
            Self::Close => "CLOSE",
            Self::LookupMiss => "LOOKUP_MISS",
            Self::PlacementFailed => "PLACEMENT_FAILED",
            Self::LegPlaced => "LEG_PLACED",
            Self::LegFailed => "LEG_FAILED",
            Self::LegCancelled => "LEG_CANCELLED",
            Self::LegReplacementFailed => "LEG_REPLACEMENT_FAILED",
            Self::PrimaryOperationFailed => "PRIMARY_OPERATION_FAILED",
            Self::FallbackSucceeded => "FALLBACK_SUCCEEDED",
            Self::FallbackFailed => "FALLBACK_FAILED",
            Self::SignalFailed => "SIGNAL_FAILED",
            Self::HandleExecution => "HANDLE_EXECUTION",
        }
    }
}

impl fmt::Display for AuditTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Signal chain id.
    pub signal_id: SignalOrderId,
    /// Channel.
    pub channel_id: ChannelId,
    /// Decision point.
    pub tag: AuditTag,
    /// Free-form details.
    pub payload: Value,
    /// Time of the decision.
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Create an event stamped now.
    #[must_use]
    pub fn new(signal_id: SignalOrderId, channel_id: ChannelId, tag: AuditTag, payload: Value) -> Self {
        Self {
            signal_id,
            channel_id,
            tag,
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Port for audit records. Recording never fails from the caller's view.
pub trait AuditSink: Send + Sync {
    /// Record an event.
    fn record(&self, event: AuditEvent);
}

/// Audit sink keeping events in memory; used by tests and the paper venue.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditLog {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Tags in recording order.
    #[must_use]
    pub fn tags(&self) -> Vec<AuditTag> {
        self.events().into_iter().map(|e| e.tag).collect()
    }

    /// Number of events with a tag.
    #[must_use]
    pub fn count(&self, tag: AuditTag) -> usize {
        self.events().iter().filter(|e| e.tag == tag).count()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn record(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn in_memory_log_keeps_order() {
        let log = InMemoryAuditLog::new();

        log.record(AuditEvent::new(
            "1".into(),
            "chan".into(),
            AuditTag::PrimaryOperationFailed,
            json!({"operation": "close_position"}),
        ));
        log.record(AuditEvent::new(
            "1".into(),
            "chan".into(),
            AuditTag::FallbackSucceeded,
            json!({}),
        ));

        assert_eq!(
            log.tags(),
            vec![AuditTag::PrimaryOperationFailed, AuditTag::FallbackSucceeded]
        );
        assert_eq!(log.count(AuditTag::FallbackSucceeded), 1);
    }

    #[test]
    fn clones_share_storage() {
        let log = InMemoryAuditLog::new();
        let other = log.clone();

        other.record(AuditEvent::new("1".into(), "c".into(), AuditTag::Open, json!({})));

        assert_eq!(log.events().len(), 1);
        assert_eq!(AuditTag::HandleExecution.to_string(), "HANDLE_EXECUTION");
    }
}
