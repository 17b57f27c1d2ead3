//! PostgreSQL store for the session authority and permission engine.

use async_trait::async_trait;
use chrono::Utc;
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use super::permission::{PermissionStore, Principal};
use crate::models::{
    Group, GrantKind, ImpersonationSession, PermissionAction, PermissionSet,
    PermissionSetAssignment, PermissionSetGrant, PrincipalType, RefreshToken, SingleUseToken,
    TokenFlow, User,
};
use crate::utils::normalize_email;

/// True when the error is a unique-constraint violation, used to surface
/// duplicate names/assignments/grants as conflicts.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ==================== User Operations ====================

    pub async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn insert_user(&self, user: &User) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users
                (user_id, email, password_hash, email_verified, two_factor_enabled, locked,
                 role, display_name, profile, created_utc, updated_utc, last_login_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.email_verified)
        .bind(user.two_factor_enabled)
        .bind(user.locked)
        .bind(&user.role)
        .bind(&user.display_name)
        .bind(&user.profile)
        .bind(user.created_utc)
        .bind(user.updated_utc)
        .bind(user.last_login_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY email")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn update_user_profile(
        &self,
        user_id: Uuid,
        display_name: Option<String>,
        profile: Option<serde_json::Value>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                display_name = COALESCE($1, display_name),
                profile = COALESCE($2, profile),
                updated_utc = $3
            WHERE user_id = $4
            "#,
        )
        .bind(display_name)
        .bind(profile)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn update_user_password(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_utc = $2 WHERE email = $3",
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(normalize_email(email))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_user_locked(&self, user_id: Uuid, locked: bool) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET locked = $1, updated_utc = $2 WHERE user_id = $3")
                .bind(locked)
                .bind(Utc::now())
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_user_role(&self, user_id: Uuid, role: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET role = $1, updated_utc = $2 WHERE user_id = $3")
            .bind(role)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_user_verified(&self, email: &str, verified: bool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET email_verified = $1, updated_utc = $2 WHERE email = $3",
        )
        .bind(verified)
        .bind(Utc::now())
        .bind(normalize_email(email))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn update_last_login(&self, email: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_utc = $1 WHERE email = $2")
            .bind(Utc::now())
            .bind(normalize_email(email))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_user(&self, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ==================== Refresh Token Operations ====================

    pub async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens
                (token_id, user_email, token_hash, expires_utc, created_utc,
                 revoked_utc, client_ip, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(token.token_id)
        .bind(&token.user_email)
        .bind(&token.token_hash)
        .bind(token.expires_utc)
        .bind(token.created_utc)
        .bind(token.revoked_utc)
        .bind(&token.client_ip)
        .bind(&token.user_agent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Atomically claim a refresh token for rotation. The conditional UPDATE
    /// is the anti-replay point: of two concurrent redemptions exactly one
    /// gets the row back, the other sees no unrevoked match.
    pub async fn rotate_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, sqlx::Error> {
        sqlx::query_as::<_, RefreshToken>(
            r#"
            UPDATE refresh_tokens SET revoked_utc = $1
            WHERE token_hash = $2 AND revoked_utc IS NULL AND expires_utc > $1
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
    }

    /// Revoke one token (logout). Returns false when no unrevoked row matched.
    pub async fn revoke_refresh_token(&self, token_hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_utc = $1 WHERE token_hash = $2 AND revoked_utc IS NULL",
        )
        .bind(Utc::now())
        .bind(token_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke every live token for a user (logout-all, password change).
    pub async fn revoke_all_refresh_tokens(&self, email: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_utc = $1 WHERE user_email = $2 AND revoked_utc IS NULL",
        )
        .bind(Utc::now())
        .bind(normalize_email(email))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ==================== Single-Use Token Operations ====================

    pub async fn insert_single_use_token(
        &self,
        flow: TokenFlow,
        token: &SingleUseToken,
    ) -> Result<(), sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO {}
                (token_id, email, token_hash, code_hash, expires_utc, created_utc, used_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
            flow.table()
        );
        sqlx::query(&sql)
            .bind(token.token_id)
            .bind(&token.email)
            .bind(&token.token_hash)
            .bind(&token.code_hash)
            .bind(token.expires_utc)
            .bind(token.created_utc)
            .bind(token.used_utc)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Redeem by token hash. Single-use: `used_utc` is set exactly once by
    /// the conditional UPDATE; expired, used and unknown all come back None.
    pub async fn redeem_single_use_token(
        &self,
        flow: TokenFlow,
        token_hash: &str,
    ) -> Result<Option<SingleUseToken>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE {} SET used_utc = $1
            WHERE token_hash = $2 AND used_utc IS NULL AND expires_utc > $1
            RETURNING *
            "#,
            flow.table()
        );
        sqlx::query_as::<_, SingleUseToken>(&sql)
            .bind(Utc::now())
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
    }

    /// Redeem a verification row by (email, code hash) for code entry.
    pub async fn redeem_verification_code(
        &self,
        email: &str,
        code_hash: &str,
    ) -> Result<Option<SingleUseToken>, sqlx::Error> {
        sqlx::query_as::<_, SingleUseToken>(
            r#"
            UPDATE verification_tokens SET used_utc = $1
            WHERE email = $2 AND code_hash = $3 AND used_utc IS NULL AND expires_utc > $1
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(normalize_email(email))
        .bind(code_hash)
        .fetch_optional(&self.pool)
        .await
    }

    // ==================== Group Operations ====================

    pub async fn insert_group(&self, group: &Group) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO groups (group_id, name, description, kind, segment_key, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(group.group_id)
        .bind(&group.name)
        .bind(&group.description)
        .bind(&group.kind)
        .bind(&group.segment_key)
        .bind(group.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_group_by_id(&self, group_id: Uuid) -> Result<Option<Group>, sqlx::Error> {
        sqlx::query_as::<_, Group>("SELECT * FROM groups WHERE group_id = $1")
            .bind(group_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_groups(&self) -> Result<Vec<Group>, sqlx::Error> {
        sqlx::query_as::<_, Group>("SELECT * FROM groups ORDER BY name")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn update_group(
        &self,
        group_id: Uuid,
        name: &str,
        description: Option<String>,
        kind: &str,
        segment_key: Option<String>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE groups SET name = $1, description = $2, kind = $3, segment_key = $4
            WHERE group_id = $5
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(kind)
        .bind(segment_key)
        .bind(group_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_group(&self, group_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM groups WHERE group_id = $1")
            .bind(group_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn add_group_member(&self, group_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO group_members (group_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(group_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_group_member(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
            .bind(group_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn group_member_ids(&self, group_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT user_id FROM group_members WHERE group_id = $1")
                .bind(group_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn groups_for_user_id(&self, user_id: Uuid) -> Result<Vec<Group>, sqlx::Error> {
        sqlx::query_as::<_, Group>(
            r#"
            SELECT g.* FROM groups g
            JOIN group_members gm ON gm.group_id = g.group_id
            WHERE gm.user_id = $1
            ORDER BY g.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    // ==================== Permission Action Registry ====================

    pub async fn insert_permission_action(
        &self,
        action: &PermissionAction,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO permission_actions
                (action_id, action_key, pack, label, default_enabled, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(action.action_id)
        .bind(&action.action_key)
        .bind(&action.pack)
        .bind(&action.label)
        .bind(action.default_enabled)
        .bind(action.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_permission_action(
        &self,
        action_key: &str,
    ) -> Result<Option<PermissionAction>, sqlx::Error> {
        sqlx::query_as::<_, PermissionAction>(
            "SELECT * FROM permission_actions WHERE action_key = $1",
        )
        .bind(action_key)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn list_permission_actions(&self) -> Result<Vec<PermissionAction>, sqlx::Error> {
        sqlx::query_as::<_, PermissionAction>("SELECT * FROM permission_actions ORDER BY action_key")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn update_permission_action(
        &self,
        action_key: &str,
        label: &str,
        default_enabled: bool,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE permission_actions SET label = $1, default_enabled = $2 WHERE action_key = $3",
        )
        .bind(label)
        .bind(default_enabled)
        .bind(action_key)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_permission_action(&self, action_key: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM permission_actions WHERE action_key = $1")
            .bind(action_key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ==================== Permission Set Operations ====================

    pub async fn insert_permission_set(&self, set: &PermissionSet) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO permission_sets (set_id, name, description, template_role, created_utc)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(set.set_id)
        .bind(&set.name)
        .bind(&set.description)
        .bind(&set.template_role)
        .bind(set.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_permission_set(
        &self,
        set_id: Uuid,
    ) -> Result<Option<PermissionSet>, sqlx::Error> {
        sqlx::query_as::<_, PermissionSet>("SELECT * FROM permission_sets WHERE set_id = $1")
            .bind(set_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_permission_sets(&self) -> Result<Vec<PermissionSet>, sqlx::Error> {
        sqlx::query_as::<_, PermissionSet>("SELECT * FROM permission_sets ORDER BY name")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn update_permission_set(
        &self,
        set_id: Uuid,
        name: &str,
        description: Option<String>,
        template_role: Option<String>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE permission_sets SET name = $1, description = $2, template_role = $3
            WHERE set_id = $4
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(template_role)
        .bind(set_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Deleting a set cascades its assignments and grants via FK.
    pub async fn delete_permission_set(&self, set_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM permission_sets WHERE set_id = $1")
            .bind(set_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn insert_set_assignment(
        &self,
        set_id: Uuid,
        principal_type: PrincipalType,
        principal_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO permission_set_assignments (set_id, principal_type, principal_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(set_id)
        .bind(principal_type.as_str())
        .bind(principal_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_set_assignment(
        &self,
        set_id: Uuid,
        principal_type: PrincipalType,
        principal_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM permission_set_assignments
            WHERE set_id = $1 AND principal_type = $2 AND principal_id = $3
            "#,
        )
        .bind(set_id)
        .bind(principal_type.as_str())
        .bind(principal_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_set_assignments(
        &self,
        set_id: Uuid,
    ) -> Result<Vec<PermissionSetAssignment>, sqlx::Error> {
        sqlx::query_as::<_, PermissionSetAssignment>(
            "SELECT * FROM permission_set_assignments WHERE set_id = $1 ORDER BY principal_type, principal_id",
        )
        .bind(set_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn insert_set_grant(
        &self,
        kind: GrantKind,
        set_id: Uuid,
        grant_key: &str,
    ) -> Result<(), sqlx::Error> {
        let sql = format!(
            "INSERT INTO {} (set_id, grant_key) VALUES ($1, $2)",
            kind.table()
        );
        sqlx::query(&sql)
            .bind(set_id)
            .bind(grant_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_set_grant(
        &self,
        kind: GrantKind,
        set_id: Uuid,
        grant_key: &str,
    ) -> Result<u64, sqlx::Error> {
        let sql = format!(
            "DELETE FROM {} WHERE set_id = $1 AND grant_key = $2",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(set_id)
            .bind(grant_key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_set_grants(
        &self,
        kind: GrantKind,
        set_id: Uuid,
    ) -> Result<Vec<PermissionSetGrant>, sqlx::Error> {
        let sql = format!(
            "SELECT * FROM {} WHERE set_id = $1 ORDER BY grant_key",
            kind.table()
        );
        sqlx::query_as::<_, PermissionSetGrant>(&sql)
            .bind(set_id)
            .fetch_all(&self.pool)
            .await
    }

    // ==================== Explicit Action Permission Rows ====================

    pub async fn upsert_role_action_permission(
        &self,
        role: &str,
        action_key: &str,
        allowed: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO role_action_permissions (role, action_key, allowed)
            VALUES ($1, $2, $3)
            ON CONFLICT (role, action_key) DO UPDATE SET allowed = $3
            "#,
        )
        .bind(role)
        .bind(action_key)
        .bind(allowed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_role_action_permission(
        &self,
        role: &str,
        action_key: &str,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM role_action_permissions WHERE role = $1 AND action_key = $2")
                .bind(role)
                .bind(action_key)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn upsert_group_action_permission(
        &self,
        group_id: Uuid,
        action_key: &str,
        allowed: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO group_action_permissions (group_id, action_key, allowed)
            VALUES ($1, $2, $3)
            ON CONFLICT (group_id, action_key) DO UPDATE SET allowed = $3
            "#,
        )
        .bind(group_id)
        .bind(action_key)
        .bind(allowed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_group_action_permission(
        &self,
        group_id: Uuid,
        action_key: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM group_action_permissions WHERE group_id = $1 AND action_key = $2",
        )
        .bind(group_id)
        .bind(action_key)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn upsert_user_action_override(
        &self,
        email: &str,
        action_key: &str,
        allowed: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_action_overrides (user_email, action_key, allowed)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_email, action_key) DO UPDATE SET allowed = $3
            "#,
        )
        .bind(normalize_email(email))
        .bind(action_key)
        .bind(allowed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_user_action_override(
        &self,
        email: &str,
        action_key: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM user_action_overrides WHERE user_email = $1 AND action_key = $2",
        )
        .bind(normalize_email(email))
        .bind(action_key)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ==================== Impersonation Sessions ====================

    pub async fn insert_impersonation_session(
        &self,
        session: &ImpersonationSession,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO impersonation_sessions
                (session_id, admin_email, impersonated_email, started_utc, ended_utc, ended_reason)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(session.session_id)
        .bind(&session.admin_email)
        .bind(&session.impersonated_email)
        .bind(session.started_utc)
        .bind(session.ended_utc)
        .bind(&session.ended_reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_impersonation_session(
        &self,
        session_id: Uuid,
    ) -> Result<Option<ImpersonationSession>, sqlx::Error> {
        sqlx::query_as::<_, ImpersonationSession>(
            "SELECT * FROM impersonation_sessions WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// End a session. The conditional UPDATE makes the terminal transition
    /// idempotent: ending an already-ended session touches nothing.
    pub async fn end_impersonation_session(
        &self,
        session_id: Uuid,
        reason: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE impersonation_sessions SET ended_utc = $1, ended_reason = $2
            WHERE session_id = $3 AND ended_utc IS NULL
            "#,
        )
        .bind(Utc::now())
        .bind(reason)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

// ==================== PermissionStore ====================

#[async_trait]
impl PermissionStore for Database {
    async fn find_action(&self, action_key: &str) -> Result<Option<PermissionAction>, AppError> {
        self.find_permission_action(action_key)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn find_user_override(
        &self,
        email: &str,
        action_key: &str,
    ) -> Result<Option<bool>, AppError> {
        let row: Option<(bool,)> = sqlx::query_as(
            "SELECT allowed FROM user_action_overrides WHERE user_email = $1 AND action_key = $2",
        )
        .bind(normalize_email(email))
        .bind(action_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(row.map(|(allowed,)| allowed))
    }

    async fn has_set_action_grant(
        &self,
        principal: &Principal,
        role: &str,
        action_key: &str,
    ) -> Result<bool, AppError> {
        let group_ids: Vec<String> = principal.group_ids.iter().map(Uuid::to_string).collect();
        let granted: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM permission_set_assignments a
                JOIN permission_set_action_grants g ON g.set_id = a.set_id
                WHERE g.grant_key = $1
                  AND ((a.principal_type = 'user' AND a.principal_id = $2)
                    OR (a.principal_type = 'role' AND a.principal_id = $3)
                    OR (a.principal_type = 'group' AND a.principal_id = ANY($4)))
            )
            "#,
        )
        .bind(action_key)
        .bind(&principal.email)
        .bind(role)
        .bind(&group_ids)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(granted)
    }

    async fn group_action_permissions(
        &self,
        group_ids: &[Uuid],
        action_key: &str,
    ) -> Result<Vec<bool>, AppError> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<(bool,)> = sqlx::query_as(
            "SELECT allowed FROM group_action_permissions WHERE action_key = $1 AND group_id = ANY($2)",
        )
        .bind(action_key)
        .bind(group_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(rows.into_iter().map(|(allowed,)| allowed).collect())
    }

    async fn find_role_action_permission(
        &self,
        role: &str,
        action_key: &str,
    ) -> Result<Option<bool>, AppError> {
        let row: Option<(bool,)> = sqlx::query_as(
            "SELECT allowed FROM role_action_permissions WHERE role = $1 AND action_key = $2",
        )
        .bind(role)
        .bind(action_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(row.map(|(allowed,)| allowed))
    }

    async fn has_set_page_grant(
        &self,
        principal: &Principal,
        role: &str,
        page_key: &str,
    ) -> Result<bool, AppError> {
        let group_ids: Vec<String> = principal.group_ids.iter().map(Uuid::to_string).collect();
        let granted: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM permission_set_assignments a
                JOIN permission_set_page_grants g ON g.set_id = a.set_id
                WHERE g.grant_key = $1
                  AND ((a.principal_type = 'user' AND a.principal_id = $2)
                    OR (a.principal_type = 'role' AND a.principal_id = $3)
                    OR (a.principal_type = 'group' AND a.principal_id = ANY($4)))
            )
            "#,
        )
        .bind(page_key)
        .bind(&principal.email)
        .bind(role)
        .bind(&group_ids)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(granted)
    }
}
