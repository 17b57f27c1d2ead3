//! Impersonation sessions - bounded elevation with audit provenance.
//!
//! The admin action gate runs in the handler, before this service creates
//! any row. The issued token authorizes as the target while carrying the
//! true actor in its claims.

use std::sync::Arc;
use uuid::Uuid;

use crate::models::{AuditEvent, ImpersonationSession};
use crate::services::{
    audit::{self, AuditSink},
    token::TokenService,
    Database, ServiceError,
};
use crate::utils::normalize_email;

#[derive(Clone)]
pub struct ImpersonationService {
    db: Database,
    tokens: TokenService,
    audit: Arc<dyn AuditSink>,
}

pub struct StartedImpersonation {
    pub session: ImpersonationSession,
    pub access_token: String,
    pub expires_in: i64,
}

impl ImpersonationService {
    pub fn new(db: Database, tokens: TokenService, audit: Arc<dyn AuditSink>) -> Self {
        Self { db, tokens, audit }
    }

    /// Start an impersonation session. The caller has already passed the
    /// admin gate; nothing is persisted before that happens.
    pub async fn start(
        &self,
        admin_email: &str,
        target_email: &str,
    ) -> Result<StartedImpersonation, ServiceError> {
        let admin_email = normalize_email(admin_email);
        let target_email = normalize_email(target_email);

        if admin_email == target_email {
            return Err(ServiceError::ValidationError(
                "Cannot impersonate yourself".to_string(),
            ));
        }

        let target = self
            .db
            .find_user_by_email(&target_email)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User".to_string()))?;

        if target.locked {
            return Err(ServiceError::AccountLocked);
        }

        let session = ImpersonationSession::new(admin_email.clone(), target_email.clone());
        self.db.insert_impersonation_session(&session).await?;

        let access_token = self
            .tokens
            .issue_for_user(
                &target,
                None,
                Some((admin_email.clone(), session.session_id)),
            )
            .map_err(ServiceError::Internal)?;

        tracing::info!(
            admin = %admin_email,
            target = %target_email,
            session_id = %session.session_id,
            "Impersonation session started"
        );
        audit::emit(
            &self.audit,
            AuditEvent::new(
                Some(admin_email),
                "impersonation.start",
                format!("Impersonating {}", target_email),
            )
            .entity("impersonation_session", session.session_id.to_string()),
        );

        Ok(StartedImpersonation {
            access_token,
            expires_in: self.tokens.access_token_expiry_seconds(),
            session,
        })
    }

    /// End a session. Idempotent: ending an already-ended session is a
    /// no-op, not an error. Unknown ids are a 404.
    pub async fn end(
        &self,
        session_id: Uuid,
        actor_email: &str,
        reason: &str,
    ) -> Result<ImpersonationSession, ServiceError> {
        let ended_now = self.db.end_impersonation_session(session_id, reason).await? > 0;

        let session = self
            .db
            .find_impersonation_session(session_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Impersonation session".to_string()))?;

        if ended_now {
            tracing::info!(session_id = %session_id, reason = %reason, "Impersonation session ended");
            audit::emit(
                &self.audit,
                AuditEvent::new(
                    Some(actor_email.to_string()),
                    "impersonation.end",
                    format!("Ended impersonation of {}", session.impersonated_email),
                )
                .entity("impersonation_session", session_id.to_string())
                .details(serde_json::json!({ "reason": reason })),
            );
        }

        Ok(session)
    }
}
