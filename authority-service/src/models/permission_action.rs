//! Permission action model - the registry of authorizable capabilities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Registered action. `action_key` is globally unique across packs;
/// `default_enabled` is the fallback when nothing in the precedence chain
/// decides the key.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PermissionAction {
    pub action_id: Uuid,
    pub action_key: String,
    pub pack: String,
    pub label: String,
    pub default_enabled: bool,
    pub created_utc: DateTime<Utc>,
}

impl PermissionAction {
    pub fn new(action_key: String, pack: String, label: String, default_enabled: bool) -> Self {
        Self {
            action_id: Uuid::new_v4(),
            action_key,
            pack,
            label,
            default_enabled,
            created_utc: Utc::now(),
        }
    }
}
