//! Permission-set store operations - CRUD for sets, principal assignments
//! and the three grant kinds.

use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    AuditEvent, GrantKind, PermissionSet, PermissionSetAssignment, PermissionSetGrant,
    PrincipalType,
};
use crate::services::{
    audit::{self, AuditSink},
    store::is_unique_violation,
    Database, ServiceError,
};

fn validate_template_role(template_role: &Option<String>) -> Result<(), ServiceError> {
    match template_role.as_deref() {
        None | Some("admin") | Some("user") => Ok(()),
        Some(other) => Err(ServiceError::ValidationError(format!(
            "template_role must be 'admin' or 'user', got '{}'",
            other
        ))),
    }
}

#[derive(Clone)]
pub struct PermissionSetService {
    db: Database,
    audit: Arc<dyn AuditSink>,
}

impl PermissionSetService {
    pub fn new(db: Database, audit: Arc<dyn AuditSink>) -> Self {
        Self { db, audit }
    }

    pub async fn create(
        &self,
        actor: &str,
        name: String,
        description: Option<String>,
        template_role: Option<String>,
    ) -> Result<PermissionSet, ServiceError> {
        validate_template_role(&template_role)?;

        let set = PermissionSet::new(name, description, template_role);
        self.db.insert_permission_set(&set).await.map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict("A permission set with this name already exists".to_string())
            } else {
                ServiceError::Database(e)
            }
        })?;

        audit::emit(
            &self.audit,
            AuditEvent::new(Some(actor.to_string()), "permission_set.create", &set.name)
                .entity("permission_set", set.set_id.to_string()),
        );
        Ok(set)
    }

    pub async fn get(&self, set_id: Uuid) -> Result<PermissionSet, ServiceError> {
        self.db
            .find_permission_set(set_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Permission set".to_string()))
    }

    pub async fn list(&self) -> Result<Vec<PermissionSet>, ServiceError> {
        Ok(self.db.list_permission_sets().await?)
    }

    pub async fn update(
        &self,
        actor: &str,
        set_id: Uuid,
        name: String,
        description: Option<String>,
        template_role: Option<String>,
    ) -> Result<PermissionSet, ServiceError> {
        validate_template_role(&template_role)?;

        let updated = self
            .db
            .update_permission_set(set_id, &name, description, template_role)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::Conflict(
                        "A permission set with this name already exists".to_string(),
                    )
                } else {
                    ServiceError::Database(e)
                }
            })?;
        if updated == 0 {
            return Err(ServiceError::NotFound("Permission set".to_string()));
        }

        audit::emit(
            &self.audit,
            AuditEvent::new(Some(actor.to_string()), "permission_set.update", &name)
                .entity("permission_set", set_id.to_string()),
        );
        self.get(set_id).await
    }

    /// Delete a set; assignments and grants cascade with it.
    pub async fn delete(&self, actor: &str, set_id: Uuid) -> Result<(), ServiceError> {
        if self.db.delete_permission_set(set_id).await? == 0 {
            return Err(ServiceError::NotFound("Permission set".to_string()));
        }

        audit::emit(
            &self.audit,
            AuditEvent::new(
                Some(actor.to_string()),
                "permission_set.delete",
                "Permission set deleted",
            )
            .entity("permission_set", set_id.to_string()),
        );
        Ok(())
    }

    pub async fn add_assignment(
        &self,
        actor: &str,
        set_id: Uuid,
        principal_type: PrincipalType,
        principal_id: &str,
    ) -> Result<(), ServiceError> {
        // Surface an unknown set as 404 rather than an FK violation.
        self.get(set_id).await?;

        self.db
            .insert_set_assignment(set_id, principal_type, principal_id)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::Conflict("Assignment already exists".to_string())
                } else {
                    ServiceError::Database(e)
                }
            })?;

        audit::emit(
            &self.audit,
            AuditEvent::new(
                Some(actor.to_string()),
                "permission_set.assign",
                format!("{}:{}", principal_type.as_str(), principal_id),
            )
            .entity("permission_set", set_id.to_string()),
        );
        Ok(())
    }

    pub async fn remove_assignment(
        &self,
        actor: &str,
        set_id: Uuid,
        principal_type: PrincipalType,
        principal_id: &str,
    ) -> Result<(), ServiceError> {
        if self
            .db
            .delete_set_assignment(set_id, principal_type, principal_id)
            .await?
            == 0
        {
            return Err(ServiceError::NotFound("Assignment".to_string()));
        }

        audit::emit(
            &self.audit,
            AuditEvent::new(
                Some(actor.to_string()),
                "permission_set.unassign",
                format!("{}:{}", principal_type.as_str(), principal_id),
            )
            .entity("permission_set", set_id.to_string()),
        );
        Ok(())
    }

    pub async fn list_assignments(
        &self,
        set_id: Uuid,
    ) -> Result<Vec<PermissionSetAssignment>, ServiceError> {
        self.get(set_id).await?;
        Ok(self.db.list_set_assignments(set_id).await?)
    }

    pub async fn add_grant(
        &self,
        actor: &str,
        set_id: Uuid,
        kind: GrantKind,
        grant_key: &str,
    ) -> Result<(), ServiceError> {
        self.get(set_id).await?;

        self.db
            .insert_set_grant(kind, set_id, grant_key)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::Conflict("Grant already exists".to_string())
                } else {
                    ServiceError::Database(e)
                }
            })?;

        audit::emit(
            &self.audit,
            AuditEvent::new(
                Some(actor.to_string()),
                "permission_set.grant",
                grant_key.to_string(),
            )
            .entity("permission_set", set_id.to_string()),
        );
        Ok(())
    }

    pub async fn remove_grant(
        &self,
        actor: &str,
        set_id: Uuid,
        kind: GrantKind,
        grant_key: &str,
    ) -> Result<(), ServiceError> {
        if self.db.delete_set_grant(kind, set_id, grant_key).await? == 0 {
            return Err(ServiceError::NotFound("Grant".to_string()));
        }

        audit::emit(
            &self.audit,
            AuditEvent::new(
                Some(actor.to_string()),
                "permission_set.revoke_grant",
                grant_key.to_string(),
            )
            .entity("permission_set", set_id.to_string()),
        );
        Ok(())
    }

    pub async fn list_grants(
        &self,
        set_id: Uuid,
        kind: GrantKind,
    ) -> Result<Vec<PermissionSetGrant>, ServiceError> {
        self.get(set_id).await?;
        Ok(self.db.list_set_grants(kind, set_id).await?)
    }
}
