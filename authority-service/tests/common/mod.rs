//! In-memory fixtures for resolver tests.

use async_trait::async_trait;
use authority_service::models::{OrgAssignments, PermissionAction};
use authority_service::services::org::OrgDimensionStore;
use authority_service::services::permission::{PermissionStore, Principal};
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// One permission set: who it is assigned to and what it grants.
#[derive(Default)]
pub struct MemorySet {
    pub users: Vec<String>,
    pub roles: Vec<String>,
    pub groups: Vec<Uuid>,
    pub action_grants: Vec<String>,
    pub page_grants: Vec<String>,
}

#[derive(Default)]
struct MemoryState {
    actions: HashMap<String, PermissionAction>,
    user_overrides: HashMap<(String, String), bool>,
    sets: Vec<MemorySet>,
    group_permissions: HashMap<(Uuid, String), bool>,
    role_permissions: HashMap<(String, String), bool>,
}

/// Mutable in-memory stand-in for the PostgreSQL store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_action(&self, action_key: &str, default_enabled: bool) {
        let action = PermissionAction::new(
            action_key.to_string(),
            action_key.split('.').next().unwrap_or("core").to_string(),
            action_key.to_string(),
            default_enabled,
        );
        self.state
            .lock()
            .unwrap()
            .actions
            .insert(action_key.to_string(), action);
    }

    pub fn set_user_override(&self, email: &str, action_key: &str, allowed: bool) {
        self.state
            .lock()
            .unwrap()
            .user_overrides
            .insert((email.to_string(), action_key.to_string()), allowed);
    }

    pub fn add_set(&self, set: MemorySet) {
        self.state.lock().unwrap().sets.push(set);
    }

    pub fn set_group_permission(&self, group_id: Uuid, action_key: &str, allowed: bool) {
        self.state
            .lock()
            .unwrap()
            .group_permissions
            .insert((group_id, action_key.to_string()), allowed);
    }

    pub fn set_role_permission(&self, role: &str, action_key: &str, allowed: bool) {
        self.state
            .lock()
            .unwrap()
            .role_permissions
            .insert((role.to_string(), action_key.to_string()), allowed);
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn find_action(&self, action_key: &str) -> Result<Option<PermissionAction>, AppError> {
        Ok(self.state.lock().unwrap().actions.get(action_key).cloned())
    }

    async fn find_user_override(
        &self,
        email: &str,
        action_key: &str,
    ) -> Result<Option<bool>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .user_overrides
            .get(&(email.to_string(), action_key.to_string()))
            .copied())
    }

    async fn has_set_action_grant(
        &self,
        principal: &Principal,
        role: &str,
        action_key: &str,
    ) -> Result<bool, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.sets.iter().any(|set| {
            let assigned = set.users.iter().any(|u| u == &principal.email)
                || set.roles.iter().any(|r| r == role)
                || set.groups.iter().any(|g| principal.group_ids.contains(g));
            assigned && set.action_grants.iter().any(|k| k == action_key)
        }))
    }

    async fn group_action_permissions(
        &self,
        group_ids: &[Uuid],
        action_key: &str,
    ) -> Result<Vec<bool>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(group_ids
            .iter()
            .filter_map(|g| {
                state
                    .group_permissions
                    .get(&(*g, action_key.to_string()))
                    .copied()
            })
            .collect())
    }

    async fn find_role_action_permission(
        &self,
        role: &str,
        action_key: &str,
    ) -> Result<Option<bool>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .role_permissions
            .get(&(role.to_string(), action_key.to_string()))
            .copied())
    }

    async fn has_set_page_grant(
        &self,
        principal: &Principal,
        role: &str,
        page_key: &str,
    ) -> Result<bool, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.sets.iter().any(|set| {
            let assigned = set.users.iter().any(|u| u == &principal.email)
                || set.roles.iter().any(|r| r == role)
                || set.groups.iter().any(|g| principal.group_ids.contains(g));
            assigned && set.page_grants.iter().any(|k| k == page_key)
        }))
    }
}

/// Org lookup returning fixed assignments for every caller.
pub struct MemoryOrgStore(pub OrgAssignments);

#[async_trait]
impl OrgDimensionStore for MemoryOrgStore {
    async fn assignments_for(&self, _email: &str) -> Result<OrgAssignments, AppError> {
        Ok(self.0.clone())
    }
}

pub fn principal(email: &str, roles: &[&str], group_ids: &[Uuid]) -> Principal {
    Principal {
        user_id: Uuid::new_v4(),
        email: email.to_string(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        group_ids: group_ids.to_vec(),
    }
}
