//! # Audit Feature
//!
//! Append-only audit trail. Events are written once and never mutated or
//! deleted by the backend.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Action recorded when a reminder email is delivered
pub const ACTION_SENT_REMINDER_EMAIL: &str = "sent_reminder_email";

/// One immutable audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub user: String,
    pub action: String,
    /// Action-specific payload, e.g. `{"reminder": "<id>"}`
    pub meta: Value,
    pub at: DateTime<Utc>,
}

/// Append-only sink for audit events
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, user_id: &str, action: &str, meta: Value) -> Result<()>;
}
