//! User model - account records with credential and lock state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::normalize_email;

/// User entity. Email is the identity key and is stored lowercased.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub email_verified: bool,
    pub two_factor_enabled: bool,
    pub locked: bool,
    pub role: String,
    pub display_name: Option<String>,
    pub profile: serde_json::Value,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub last_login_utc: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new unverified user with the `user` role.
    pub fn new(email: &str, password_hash: String, display_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            email: normalize_email(email),
            password_hash,
            email_verified: false,
            two_factor_enabled: false,
            locked: false,
            role: "user".to_string(),
            display_name,
            profile: serde_json::json!({}),
            created_utc: now,
            updated_utc: now,
            last_login_utc: None,
        }
    }

    /// Create a verified administrator, used by the bootstrap path.
    pub fn new_admin(email: &str, password_hash: String) -> Self {
        let mut user = Self::new(email, password_hash, None);
        user.role = "admin".to_string();
        user.email_verified = true;
        user
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    /// Convert to sanitized response (no credential material).
    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self.clone())
    }
}

/// User response for API (without sensitive fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub email: String,
    pub email_verified: bool,
    pub two_factor_enabled: bool,
    pub locked: bool,
    pub role: String,
    pub display_name: Option<String>,
    pub profile: serde_json::Value,
    pub created_utc: DateTime<Utc>,
    pub last_login_utc: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            email: u.email,
            email_verified: u.email_verified,
            two_factor_enabled: u.two_factor_enabled,
            locked: u.locked,
            role: u.role,
            display_name: u.display_name,
            profile: u.profile,
            created_utc: u.created_utc,
            last_login_utc: u.last_login_utc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_normalizes_email() {
        let user = User::new(" Alice@Example.COM ", "hash".to_string(), None);
        assert_eq!(user.email, "alice@example.com");
        assert!(!user.email_verified);
        assert_eq!(user.role, "user");
    }

    #[test]
    fn test_bootstrap_admin_is_verified() {
        let user = User::new_admin("root@example.com", "hash".to_string());
        assert!(user.is_admin());
        assert!(user.email_verified);
    }
}
