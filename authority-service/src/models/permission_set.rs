//! Permission set model - reusable grant bundles and their assignments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Principal kinds a set can be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalType {
    User,
    Group,
    Role,
}

impl PrincipalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalType::User => "user",
            PrincipalType::Group => "group",
            PrincipalType::Role => "role",
        }
    }
}

/// The three grant kinds a set bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantKind {
    Page,
    Action,
    Metric,
}

impl GrantKind {
    pub fn table(&self) -> &'static str {
        match self {
            GrantKind::Page => "permission_set_page_grants",
            GrantKind::Action => "permission_set_action_grants",
            GrantKind::Metric => "permission_set_metric_grants",
        }
    }
}

/// Permission set row. `template_role` is a UI hint only; resolution never
/// consults it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PermissionSet {
    pub set_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub template_role: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl PermissionSet {
    pub fn new(name: String, description: Option<String>, template_role: Option<String>) -> Self {
        Self {
            set_id: Uuid::new_v4(),
            name,
            description,
            template_role,
            created_utc: Utc::now(),
        }
    }
}

/// Assignment of a set to a principal. Unique per triple.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PermissionSetAssignment {
    pub set_id: Uuid,
    pub principal_type: String,
    pub principal_id: String,
}

/// One grant row. Unique per (set, key) within its kind's table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PermissionSetGrant {
    pub set_id: Uuid,
    pub grant_key: String,
}
