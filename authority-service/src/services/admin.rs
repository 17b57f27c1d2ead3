//! Administrative directory operations - user and group CRUD, the
//! permission-action registry, and the explicit allow/deny rows.

use std::sync::Arc;
use uuid::Uuid;

use crate::dtos::admin::{CreateUserRequest, UpdateUserRequest};
use crate::models::{AuditEvent, Group, GroupKind, PermissionAction, User};
use crate::services::{
    audit::{self, AuditSink},
    store::is_unique_violation,
    Database, ServiceError,
};
use crate::utils::{hash_password, normalize_email, Password};

#[derive(Clone)]
pub struct AdminService {
    db: Database,
    audit: Arc<dyn AuditSink>,
}

impl AdminService {
    pub fn new(db: Database, audit: Arc<dyn AuditSink>) -> Self {
        Self { db, audit }
    }

    // ==================== Users ====================

    pub async fn create_user(
        &self,
        actor: &str,
        req: CreateUserRequest,
    ) -> Result<User, ServiceError> {
        let email = normalize_email(&req.email);
        if self.db.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict("Email already registered".to_string()));
        }

        let role = req.role.unwrap_or_else(|| "user".to_string());
        if role != "admin" && role != "user" {
            return Err(ServiceError::ValidationError(format!(
                "role must be 'admin' or 'user', got '{}'",
                role
            )));
        }

        let password_hash = hash_password(Password::new(req.password)).await?;
        let mut user = User::new(&email, password_hash.into_string(), req.display_name);
        user.role = role;
        user.email_verified = req.email_verified;
        self.db.insert_user(&user).await?;

        audit::emit(
            &self.audit,
            AuditEvent::new(Some(actor.to_string()), "admin.user.create", &user.email)
                .entity("user", user.user_id.to_string()),
        );
        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User, ServiceError> {
        self.db
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User".to_string()))
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.db.list_users().await?)
    }

    pub async fn update_user(
        &self,
        actor: &str,
        user_id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<User, ServiceError> {
        let user = self.get_user(user_id).await?;

        if req.display_name.is_some() || req.profile.is_some() {
            self.db
                .update_user_profile(user_id, req.display_name, req.profile)
                .await?;
        }
        if let Some(role) = req.role {
            if role != "admin" && role != "user" {
                return Err(ServiceError::ValidationError(format!(
                    "role must be 'admin' or 'user', got '{}'",
                    role
                )));
            }
            self.db.set_user_role(user_id, &role).await?;
        }
        if let Some(locked) = req.locked {
            self.db.set_user_locked(user_id, locked).await?;
            if locked {
                // Locking also closes every open session.
                self.db.revoke_all_refresh_tokens(&user.email).await?;
            }
        }
        if let Some(verified) = req.email_verified {
            self.db.set_user_verified(&user.email, verified).await?;
        }

        audit::emit(
            &self.audit,
            AuditEvent::new(Some(actor.to_string()), "admin.user.update", &user.email)
                .entity("user", user_id.to_string()),
        );
        self.get_user(user_id).await
    }

    pub async fn delete_user(&self, actor: &str, user_id: Uuid) -> Result<(), ServiceError> {
        let user = self.get_user(user_id).await?;
        self.db.revoke_all_refresh_tokens(&user.email).await?;
        self.db.delete_user(user_id).await?;

        audit::emit(
            &self.audit,
            AuditEvent::new(Some(actor.to_string()), "admin.user.delete", &user.email)
                .entity("user", user_id.to_string()),
        );
        Ok(())
    }

    // ==================== Groups ====================

    pub async fn create_group(
        &self,
        actor: &str,
        name: String,
        description: Option<String>,
        kind: GroupKind,
    ) -> Result<Group, ServiceError> {
        let group = Group::new(name, description, kind);
        self.db.insert_group(&group).await.map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict("A group with this name already exists".to_string())
            } else {
                ServiceError::Database(e)
            }
        })?;

        audit::emit(
            &self.audit,
            AuditEvent::new(Some(actor.to_string()), "admin.group.create", &group.name)
                .entity("group", group.group_id.to_string()),
        );
        Ok(group)
    }

    pub async fn get_group(&self, group_id: Uuid) -> Result<Group, ServiceError> {
        self.db
            .find_group_by_id(group_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Group".to_string()))
    }

    pub async fn list_groups(&self) -> Result<Vec<Group>, ServiceError> {
        Ok(self.db.list_groups().await?)
    }

    pub async fn update_group(
        &self,
        actor: &str,
        group_id: Uuid,
        name: String,
        description: Option<String>,
        kind: GroupKind,
    ) -> Result<Group, ServiceError> {
        let updated = self
            .db
            .update_group(
                group_id,
                &name,
                description,
                kind.as_str(),
                kind.segment_key().map(str::to_string),
            )
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::Conflict("A group with this name already exists".to_string())
                } else {
                    ServiceError::Database(e)
                }
            })?;
        if updated == 0 {
            return Err(ServiceError::NotFound("Group".to_string()));
        }

        audit::emit(
            &self.audit,
            AuditEvent::new(Some(actor.to_string()), "admin.group.update", &name)
                .entity("group", group_id.to_string()),
        );
        self.get_group(group_id).await
    }

    pub async fn delete_group(&self, actor: &str, group_id: Uuid) -> Result<(), ServiceError> {
        if self.db.delete_group(group_id).await? == 0 {
            return Err(ServiceError::NotFound("Group".to_string()));
        }

        audit::emit(
            &self.audit,
            AuditEvent::new(Some(actor.to_string()), "admin.group.delete", "Group deleted")
                .entity("group", group_id.to_string()),
        );
        Ok(())
    }

    pub async fn add_group_member(
        &self,
        actor: &str,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), ServiceError> {
        let group = self.get_group(group_id).await?;
        if matches!(group.group_kind(), Ok(GroupKind::Dynamic { .. })) {
            return Err(ServiceError::ValidationError(
                "Dynamic group membership is computed upstream and cannot be edited".to_string(),
            ));
        }
        self.get_user(user_id).await?;
        self.db.add_group_member(group_id, user_id).await?;

        audit::emit(
            &self.audit,
            AuditEvent::new(Some(actor.to_string()), "admin.group.add_member", &group.name)
                .entity("group", group_id.to_string())
                .details(serde_json::json!({ "user_id": user_id })),
        );
        Ok(())
    }

    pub async fn remove_group_member(
        &self,
        actor: &str,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), ServiceError> {
        if self.db.remove_group_member(group_id, user_id).await? == 0 {
            return Err(ServiceError::NotFound("Group member".to_string()));
        }

        audit::emit(
            &self.audit,
            AuditEvent::new(
                Some(actor.to_string()),
                "admin.group.remove_member",
                "Member removed",
            )
            .entity("group", group_id.to_string())
            .details(serde_json::json!({ "user_id": user_id })),
        );
        Ok(())
    }

    pub async fn list_group_members(&self, group_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        self.get_group(group_id).await?;
        Ok(self.db.group_member_ids(group_id).await?)
    }

    // ==================== Permission Action Registry ====================

    pub async fn create_action(
        &self,
        actor: &str,
        action_key: String,
        pack: String,
        label: String,
        default_enabled: bool,
    ) -> Result<PermissionAction, ServiceError> {
        let action = PermissionAction::new(action_key, pack, label, default_enabled);
        self.db.insert_permission_action(&action).await.map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict("Action key is already registered".to_string())
            } else {
                ServiceError::Database(e)
            }
        })?;

        audit::emit(
            &self.audit,
            AuditEvent::new(Some(actor.to_string()), "admin.action.create", &action.action_key)
                .entity("permission_action", action.action_id.to_string()),
        );
        Ok(action)
    }

    pub async fn get_action(&self, action_key: &str) -> Result<PermissionAction, ServiceError> {
        self.db
            .find_permission_action(action_key)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Permission action".to_string()))
    }

    pub async fn list_actions(&self) -> Result<Vec<PermissionAction>, ServiceError> {
        Ok(self.db.list_permission_actions().await?)
    }

    pub async fn update_action(
        &self,
        actor: &str,
        action_key: &str,
        label: String,
        default_enabled: bool,
    ) -> Result<PermissionAction, ServiceError> {
        if self
            .db
            .update_permission_action(action_key, &label, default_enabled)
            .await?
            == 0
        {
            return Err(ServiceError::NotFound("Permission action".to_string()));
        }

        audit::emit(
            &self.audit,
            AuditEvent::new(Some(actor.to_string()), "admin.action.update", action_key),
        );
        self.get_action(action_key).await
    }

    pub async fn delete_action(&self, actor: &str, action_key: &str) -> Result<(), ServiceError> {
        if self.db.delete_permission_action(action_key).await? == 0 {
            return Err(ServiceError::NotFound("Permission action".to_string()));
        }

        audit::emit(
            &self.audit,
            AuditEvent::new(Some(actor.to_string()), "admin.action.delete", action_key),
        );
        Ok(())
    }

    // ==================== Explicit Permission Rows ====================

    pub async fn set_user_override(
        &self,
        actor: &str,
        email: &str,
        action_key: &str,
        allowed: bool,
    ) -> Result<(), ServiceError> {
        self.get_action(action_key).await?;
        self.db
            .upsert_user_action_override(email, action_key, allowed)
            .await?;

        audit::emit(
            &self.audit,
            AuditEvent::new(
                Some(actor.to_string()),
                "admin.override.set",
                format!("{} -> {} = {}", email, action_key, allowed),
            ),
        );
        Ok(())
    }

    pub async fn clear_user_override(
        &self,
        actor: &str,
        email: &str,
        action_key: &str,
    ) -> Result<(), ServiceError> {
        if self.db.delete_user_action_override(email, action_key).await? == 0 {
            return Err(ServiceError::NotFound("Override".to_string()));
        }

        audit::emit(
            &self.audit,
            AuditEvent::new(
                Some(actor.to_string()),
                "admin.override.clear",
                format!("{} -> {}", email, action_key),
            ),
        );
        Ok(())
    }

    pub async fn set_role_permission(
        &self,
        actor: &str,
        role: &str,
        action_key: &str,
        allowed: bool,
    ) -> Result<(), ServiceError> {
        self.get_action(action_key).await?;
        self.db
            .upsert_role_action_permission(role, action_key, allowed)
            .await?;

        audit::emit(
            &self.audit,
            AuditEvent::new(
                Some(actor.to_string()),
                "admin.role_permission.set",
                format!("{} -> {} = {}", role, action_key, allowed),
            ),
        );
        Ok(())
    }

    pub async fn clear_role_permission(
        &self,
        actor: &str,
        role: &str,
        action_key: &str,
    ) -> Result<(), ServiceError> {
        if self.db.delete_role_action_permission(role, action_key).await? == 0 {
            return Err(ServiceError::NotFound("Role permission".to_string()));
        }

        audit::emit(
            &self.audit,
            AuditEvent::new(
                Some(actor.to_string()),
                "admin.role_permission.clear",
                format!("{} -> {}", role, action_key),
            ),
        );
        Ok(())
    }

    pub async fn set_group_permission(
        &self,
        actor: &str,
        group_id: Uuid,
        action_key: &str,
        allowed: bool,
    ) -> Result<(), ServiceError> {
        self.get_group(group_id).await?;
        self.get_action(action_key).await?;
        self.db
            .upsert_group_action_permission(group_id, action_key, allowed)
            .await?;

        audit::emit(
            &self.audit,
            AuditEvent::new(
                Some(actor.to_string()),
                "admin.group_permission.set",
                format!("{} -> {} = {}", group_id, action_key, allowed),
            ),
        );
        Ok(())
    }

    pub async fn clear_group_permission(
        &self,
        actor: &str,
        group_id: Uuid,
        action_key: &str,
    ) -> Result<(), ServiceError> {
        if self
            .db
            .delete_group_action_permission(group_id, action_key)
            .await?
            == 0
        {
            return Err(ServiceError::NotFound("Group permission".to_string()));
        }

        audit::emit(
            &self.audit,
            AuditEvent::new(
                Some(actor.to_string()),
                "admin.group_permission.clear",
                format!("{} -> {}", group_id, action_key),
            ),
        );
        Ok(())
    }
}
