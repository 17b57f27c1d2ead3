use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::{GroupKind, PrincipalType};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    pub display_name: Option<String>,
    pub role: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    pub profile: Option<serde_json::Value>,
    pub role: Option<String>,
    pub locked: Option<bool>,
    pub email_verified: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    pub description: Option<String>,

    #[serde(flatten)]
    pub kind: GroupKind,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateGroupRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    pub description: Option<String>,

    #[serde(flatten)]
    pub kind: GroupKind,
}

#[derive(Debug, Deserialize)]
pub struct GroupMemberRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePermissionSetRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    pub description: Option<String>,
    pub template_role: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePermissionSetRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    pub description: Option<String>,
    pub template_role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignmentRequest {
    pub principal_type: PrincipalType,
    pub principal_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GrantRequest {
    #[validate(length(min = 1, message = "Grant key is required"))]
    pub grant_key: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePermissionActionRequest {
    #[validate(length(min = 1, message = "Action key is required"))]
    pub action_key: String,

    #[validate(length(min = 1, message = "Pack is required"))]
    pub pack: String,

    #[validate(length(min = 1, message = "Label is required"))]
    pub label: String,

    #[serde(default)]
    pub default_enabled: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePermissionActionRequest {
    #[validate(length(min = 1, message = "Label is required"))]
    pub label: String,

    pub default_enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct ActionPermissionRequest {
    pub allowed: bool,
}
