//! Audit sink backed by `tracing`.

use crate::application::ports::{AuditEvent, AuditSink, AuditTag};

/// Writes each audit event as a structured `tracing` event on the `audit`
/// target. Failure tags are logged at warn level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let AuditEvent {
            signal_id,
            channel_id,
            tag,
            payload,
            timestamp,
        } = event;

        match tag {
            AuditTag::LookupMiss
            | AuditTag::PlacementFailed
            | AuditTag::LegFailed
            | AuditTag::LegReplacementFailed
            | AuditTag::PrimaryOperationFailed
            | AuditTag::FallbackFailed
            | AuditTag::SignalFailed => tracing::warn!(
                target: "audit",
                signal_id = %signal_id,
                channel_id = %channel_id,
                tag = %tag,
                payload = %payload,
                at = %timestamp,
                "{tag}"
            ),
            _ => tracing::info!(
                target: "audit",
                signal_id = %signal_id,
                channel_id = %channel_id,
                tag = %tag,
                payload = %payload,
                at = %timestamp,
                "{tag}"
            ),
        }
    }
}
