//! Audit emission.
//!
//! The core emits facts (who/what/when/before/after); persisting them is the
//! sink's problem. Emission is fire-and-forget: a sink failure must never
//! fail the mutation it describes, so [`AuditSink::record`] is infallible
//! and implementations handle their own errors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const AUDIT_MODULE: &str = "stock";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor_id: Uuid,
    pub company_id: Uuid,
    pub action: String,
    pub module: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_values: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_values: Option<serde_json::Value>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor_id: Uuid,
        company_id: Uuid,
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: Uuid,
        description: impl Into<String>,
    ) -> Self {
        Self {
            actor_id,
            company_id,
            action: action.into(),
            module: AUDIT_MODULE.to_string(),
            entity_type: entity_type.into(),
            entity_id,
            description: description.into(),
            old_values: None,
            new_values: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_new_values(mut self, values: serde_json::Value) -> Self {
        self.new_values = Some(values);
        self
    }

    pub fn with_old_values(mut self, values: serde_json::Value) -> Self {
        self.old_values = Some(values);
        self
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry);
}

/// Default sink: structured log lines under the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: AuditEntry) {
        tracing::info!(
            target: "audit",
            actor_id = %entry.actor_id,
            company_id = %entry.company_id,
            action = %entry.action,
            module = %entry.module,
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            "{}",
            entry.description
        );
    }
}

/// Discards everything. For tests and embedders with their own trail.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn record(&self, _entry: AuditEntry) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_builder_sets_module_and_values() {
        let entry = AuditEntry::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "validate",
            "stock_movement",
            Uuid::new_v4(),
            "Validated movement MOV-20260101-0001",
        )
        .with_new_values(serde_json::json!({"status": "validated"}));

        assert_eq!(entry.module, AUDIT_MODULE);
        assert!(entry.old_values.is_none());
        assert_eq!(
            entry.new_values.unwrap()["status"],
            serde_json::json!("validated")
        );
    }
}
