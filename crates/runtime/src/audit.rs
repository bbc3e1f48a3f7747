use tracing::info;

use bookclub_core::audit::{AuditEvent, AuditSink};

/// Forwards audit events to the tracing subscriber as structured records.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let cycle_id = event.cycle_id.as_ref().map(|id| id.0.as_str()).unwrap_or("none");
        let metadata = event
            .metadata
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(" ");
        info!(
            event_name = "audit.event",
            audit_event_id = %event.event_id,
            audit_event_type = %event.event_type,
            correlation_id = %event.correlation_id,
            cycle_id,
            category = ?event.category,
            outcome = ?event.outcome,
            actor = %event.actor,
            metadata = %metadata,
            "audit event"
        );
    }
}
