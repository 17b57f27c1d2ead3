//! Audit event model - the write contract for the best-effort audit sink.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub actor_id: Option<String>,
    pub action: String,
    pub summary: String,
    pub entity_kind: Option<String>,
    pub entity_id: Option<String>,
    pub details: serde_json::Value,
    pub method: Option<String>,
    pub path: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(actor_id: Option<String>, action: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            actor_id,
            action: action.into(),
            summary: summary.into(),
            entity_kind: None,
            entity_id: None,
            details: serde_json::json!({}),
            method: None,
            path: None,
            ip: None,
            user_agent: None,
            created_utc: Utc::now(),
        }
    }

    pub fn entity(mut self, kind: impl Into<String>, id: impl Into<String>) -> Self {
        self.entity_kind = Some(kind.into());
        self.entity_id = Some(id.into());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn request(mut self, method: impl Into<String>, path: impl Into<String>, ip: Option<String>, user_agent: Option<String>) -> Self {
        self.method = Some(method.into());
        self.path = Some(path.into());
        self.ip = ip;
        self.user_agent = user_agent;
        self
    }
}
