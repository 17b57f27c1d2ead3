//! Explicit allow/deny rows for roles, groups and individual users.

use sqlx::FromRow;
use uuid::Uuid;

/// Role-level allow/deny for one action key.
#[derive(Debug, Clone, FromRow)]
pub struct RoleActionPermission {
    pub role: String,
    pub action_key: String,
    pub allowed: bool,
}

/// Group-level allow/deny. Across a principal's groups an explicit deny
/// beats any allow for the same key.
#[derive(Debug, Clone, FromRow)]
pub struct GroupActionPermission {
    pub group_id: Uuid,
    pub action_key: String,
    pub allowed: bool,
}

/// Per-user override - the highest-precedence layer after unknown-key.
#[derive(Debug, Clone, FromRow)]
pub struct UserActionOverride {
    pub user_email: String,
    pub action_key: String,
    pub allowed: bool,
}
