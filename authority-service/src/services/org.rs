//! Org-dimension lookup - read-only collaborator facts for scope filtering.

use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::OrgAssignments;
use crate::utils::normalize_email;

/// Which division/department/location ids a user is assigned to. Owned by
/// the org collaborator; this core never mutates the rows.
#[async_trait]
pub trait OrgDimensionStore: Send + Sync {
    async fn assignments_for(&self, email: &str) -> Result<OrgAssignments, AppError>;
}

#[derive(Clone)]
pub struct PgOrgStore {
    pool: PgPool,
}

impl PgOrgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrgDimensionStore for PgOrgStore {
    async fn assignments_for(&self, email: &str) -> Result<OrgAssignments, AppError> {
        let rows: Vec<(Option<Uuid>, Option<Uuid>, Option<Uuid>)> = sqlx::query_as(
            "SELECT division_id, department_id, location_id FROM org_assignments WHERE user_email = $1",
        )
        .bind(normalize_email(email))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        let mut assignments = OrgAssignments::default();
        for (division, department, location) in rows {
            if let Some(id) = division {
                if !assignments.division_ids.contains(&id) {
                    assignments.division_ids.push(id);
                }
            }
            if let Some(id) = department {
                if !assignments.department_ids.contains(&id) {
                    assignments.department_ids.push(id);
                }
            }
            if let Some(id) = location {
                if !assignments.location_ids.contains(&id) {
                    assignments.location_ids.push(id);
                }
            }
        }
        Ok(assignments)
    }
}
