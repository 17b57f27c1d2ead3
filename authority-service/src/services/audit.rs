//! Best-effort audit emitter. Failures are logged and swallowed; the sink
//! must never escalate into the caller-visible auth path.

use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use std::sync::Arc;

use crate::models::AuditEvent;

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn write(&self, event: AuditEvent) -> Result<(), AppError>;
}

/// Fire-and-forget wrapper used by every call site.
pub fn emit(sink: &Arc<dyn AuditSink>, event: AuditEvent) {
    let sink = sink.clone();
    tokio::spawn(async move {
        if let Err(e) = sink.write(event).await {
            tracing::warn!(error = %e, "Audit write failed");
        }
    });
}

#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn write(&self, event: AuditEvent) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO audit_events
                (event_id, actor_id, action, summary, entity_kind, entity_id,
                 details, method, path, ip, user_agent, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(event.event_id)
        .bind(&event.actor_id)
        .bind(&event.action)
        .bind(&event.summary)
        .bind(&event.entity_kind)
        .bind(&event.entity_id)
        .bind(&event.details)
        .bind(&event.method)
        .bind(&event.path)
        .bind(&event.ip)
        .bind(&event.user_agent)
        .bind(event.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }
}

/// Sink that drops everything. Used in tests.
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn write(&self, _event: AuditEvent) -> Result<(), AppError> {
        Ok(())
    }
}
