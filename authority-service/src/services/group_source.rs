//! Authoritative group membership lookup.
//!
//! Static membership comes from our own rows; dynamic (segment-backed)
//! membership only exists upstream, so the composite source is the one path
//! that reflects it.

use async_trait::async_trait;
use serde::Deserialize;
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::utils::normalize_email;

#[async_trait]
pub trait GroupSource: Send + Sync {
    async fn group_ids_for(&self, email: &str) -> Result<Vec<Uuid>, AppError>;
}

/// Static membership rows from the local store.
#[derive(Clone)]
pub struct PgGroupSource {
    pool: PgPool,
}

impl PgGroupSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupSource for PgGroupSource {
    async fn group_ids_for(&self, email: &str) -> Result<Vec<Uuid>, AppError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT gm.group_id FROM group_members gm
            JOIN users u ON u.user_id = gm.user_id
            WHERE u.email = $1
            "#,
        )
        .bind(normalize_email(email))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[derive(Debug, Deserialize)]
struct UpstreamGroupsResponse {
    group_ids: Vec<Uuid>,
}

/// Segment-computed membership from the upstream service.
#[derive(Clone)]
pub struct UpstreamGroupSource {
    client: reqwest::Client,
    base_url: String,
    service_token: Option<String>,
}

impl UpstreamGroupSource {
    pub fn new(base_url: String, service_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            service_token,
        }
    }
}

#[async_trait]
impl GroupSource for UpstreamGroupSource {
    async fn group_ids_for(&self, email: &str) -> Result<Vec<Uuid>, AppError> {
        let url = format!(
            "{}/segments/users/{}/groups",
            self.base_url.trim_end_matches('/'),
            normalize_email(email)
        );

        let mut req = self.client.get(&url);
        if let Some(token) = &self.service_token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Group lookup failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Group lookup failed: {}", e)))?;

        let body: UpstreamGroupsResponse = resp
            .json()
            .await
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Group lookup failed: {}", e)))?;

        Ok(body.group_ids)
    }
}

/// Union of several sources, deduplicated.
pub struct CompositeGroupSource {
    sources: Vec<Arc<dyn GroupSource>>,
}

impl CompositeGroupSource {
    pub fn new(sources: Vec<Arc<dyn GroupSource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl GroupSource for CompositeGroupSource {
    async fn group_ids_for(&self, email: &str) -> Result<Vec<Uuid>, AppError> {
        let mut all = Vec::new();
        for source in &self.sources {
            for id in source.group_ids_for(email).await? {
                if !all.contains(&id) {
                    all.push(id);
                }
            }
        }
        Ok(all)
    }
}
