//! Impersonation session model - bounded elevated sessions with provenance.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle: created by an admin action, ends exactly once. Ending an
/// already-ended session is a no-op.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ImpersonationSession {
    pub session_id: Uuid,
    pub admin_email: String,
    pub impersonated_email: String,
    pub started_utc: DateTime<Utc>,
    pub ended_utc: Option<DateTime<Utc>>,
    pub ended_reason: Option<String>,
}

impl ImpersonationSession {
    pub fn new(admin_email: String, impersonated_email: String) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            admin_email,
            impersonated_email,
            started_utc: Utc::now(),
            ended_utc: None,
            ended_reason: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_utc.is_none()
    }
}
