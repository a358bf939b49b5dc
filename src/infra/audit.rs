//! Fire-and-forget audit recording.
//!
//! The catalog never blocks correctness on the audit trail: a sink that
//! fails must swallow the failure (logging it) instead of surfacing it.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// Audit collaborator contract.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, action: &str, resource_ids: &[String], metadata: JsonValue);
}

/// Default sink: emits a structured tracing event on the `audit` target.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, action: &str, resource_ids: &[String], metadata: JsonValue) {
        tracing::info!(
            target: "audit",
            action,
            resource_ids = ?resource_ids,
            metadata = %metadata,
            "audit event"
        );
    }
}
