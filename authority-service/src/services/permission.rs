//! Action permission resolution.
//!
//! One action key resolves through a fixed precedence chain: user override,
//! permission-set grant, group allow/deny (deny wins), role row, then the
//! action's registered default. The chain is an ordered list of rules, each
//! returning an optional decision; the first decisive rule answers.

use async_trait::async_trait;
use serde::Serialize;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::models::PermissionAction;

/// Action key gating every admin-prefixed route and impersonation start.
pub const ADMIN_GATE_ACTION: &str = "core.admin.access";

/// The authenticated identity a permission decision is made for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
    pub group_ids: Vec<Uuid>,
}

impl Principal {
    /// The binary role the resolver works with: `admin` iff present in the
    /// role set, `user` otherwise.
    pub fn derived_role(&self) -> &'static str {
        if self.roles.iter().any(|r| r == "admin") {
            "admin"
        } else {
            "user"
        }
    }
}

/// Which layer of the chain produced the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    UnknownAction,
    UserOverride,
    PermissionSet,
    GroupActionPermission,
    RoleActionPermission,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub ok: bool,
    pub source: DecisionSource,
}

/// Request-scoped decision cache, created by the auth middleware and dropped
/// with the request. Keyed by (principal email, action key) so a cache handle
/// can never leak a decision across principals.
#[derive(Clone, Default)]
pub struct DecisionCache {
    inner: Arc<Mutex<HashMap<(String, String), Decision>>>,
}

impl DecisionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, email: &str, action_key: &str) -> Option<Decision> {
        self.inner
            .lock()
            .expect("decision cache poisoned")
            .get(&(email.to_string(), action_key.to_string()))
            .copied()
    }

    pub fn put(&self, email: &str, action_key: &str, decision: Decision) {
        self.inner
            .lock()
            .expect("decision cache poisoned")
            .insert((email.to_string(), action_key.to_string()), decision);
    }
}

/// Storage the resolver reads. The production implementation is the
/// PostgreSQL store; tests use an in-memory one.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn find_action(&self, action_key: &str) -> Result<Option<PermissionAction>, AppError>;

    async fn find_user_override(
        &self,
        email: &str,
        action_key: &str,
    ) -> Result<Option<bool>, AppError>;

    /// True when any permission set assigned to the user, the derived role,
    /// or any of the user's groups carries an action grant for the key.
    async fn has_set_action_grant(
        &self,
        principal: &Principal,
        role: &str,
        action_key: &str,
    ) -> Result<bool, AppError>;

    /// The allow/deny flags across the principal's groups for one key.
    async fn group_action_permissions(
        &self,
        group_ids: &[Uuid],
        action_key: &str,
    ) -> Result<Vec<bool>, AppError>;

    async fn find_role_action_permission(
        &self,
        role: &str,
        action_key: &str,
    ) -> Result<Option<bool>, AppError>;

    /// Same shape as action grants, over the page grant table.
    async fn has_set_page_grant(
        &self,
        principal: &Principal,
        role: &str,
        page_key: &str,
    ) -> Result<bool, AppError>;
}

#[async_trait]
trait PermissionRule: Send + Sync {
    async fn evaluate(
        &self,
        store: &dyn PermissionStore,
        principal: &Principal,
        action: &PermissionAction,
    ) -> Result<Option<Decision>, AppError>;
}

struct UserOverrideRule;

#[async_trait]
impl PermissionRule for UserOverrideRule {
    async fn evaluate(
        &self,
        store: &dyn PermissionStore,
        principal: &Principal,
        action: &PermissionAction,
    ) -> Result<Option<Decision>, AppError> {
        Ok(store
            .find_user_override(&principal.email, &action.action_key)
            .await?
            .map(|allowed| Decision {
                ok: allowed,
                source: DecisionSource::UserOverride,
            }))
    }
}

struct PermissionSetRule;

#[async_trait]
impl PermissionRule for PermissionSetRule {
    async fn evaluate(
        &self,
        store: &dyn PermissionStore,
        principal: &Principal,
        action: &PermissionAction,
    ) -> Result<Option<Decision>, AppError> {
        let granted = store
            .has_set_action_grant(principal, principal.derived_role(), &action.action_key)
            .await?;
        Ok(granted.then_some(Decision {
            ok: true,
            source: DecisionSource::PermissionSet,
        }))
    }
}

struct GroupPermissionRule;

#[async_trait]
impl PermissionRule for GroupPermissionRule {
    async fn evaluate(
        &self,
        store: &dyn PermissionStore,
        principal: &Principal,
        action: &PermissionAction,
    ) -> Result<Option<Decision>, AppError> {
        let flags = store
            .group_action_permissions(&principal.group_ids, &action.action_key)
            .await?;
        if flags.is_empty() {
            return Ok(None);
        }
        // Any explicit deny beats any allow across the principal's groups.
        Ok(Some(Decision {
            ok: flags.iter().all(|allowed| *allowed),
            source: DecisionSource::GroupActionPermission,
        }))
    }
}

struct RolePermissionRule;

#[async_trait]
impl PermissionRule for RolePermissionRule {
    async fn evaluate(
        &self,
        store: &dyn PermissionStore,
        principal: &Principal,
        action: &PermissionAction,
    ) -> Result<Option<Decision>, AppError> {
        Ok(store
            .find_role_action_permission(principal.derived_role(), &action.action_key)
            .await?
            .map(|allowed| Decision {
                ok: allowed,
                source: DecisionSource::RoleActionPermission,
            }))
    }
}

struct DefaultRule;

#[async_trait]
impl PermissionRule for DefaultRule {
    async fn evaluate(
        &self,
        _store: &dyn PermissionStore,
        _principal: &Principal,
        action: &PermissionAction,
    ) -> Result<Option<Decision>, AppError> {
        Ok(Some(Decision {
            ok: action.default_enabled,
            source: DecisionSource::Default,
        }))
    }
}

/// The resolver. Deterministic for fixed store state; caches only within the
/// request via the supplied [`DecisionCache`].
pub struct PermissionResolver {
    store: Arc<dyn PermissionStore>,
    rules: Vec<Box<dyn PermissionRule>>,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self {
            store,
            // Precedence order. DefaultRule terminates the chain.
            rules: vec![
                Box::new(UserOverrideRule),
                Box::new(PermissionSetRule),
                Box::new(GroupPermissionRule),
                Box::new(RolePermissionRule),
                Box::new(DefaultRule),
            ],
        }
    }

    /// Resolve one action key for a principal.
    pub async fn check_action(
        &self,
        principal: &Principal,
        action_key: &str,
        cache: &DecisionCache,
    ) -> Result<Decision, AppError> {
        if let Some(decision) = cache.get(&principal.email, action_key) {
            return Ok(decision);
        }

        let decision = self.resolve(principal, action_key).await?;
        cache.put(&principal.email, action_key, decision);
        Ok(decision)
    }

    async fn resolve(&self, principal: &Principal, action_key: &str) -> Result<Decision, AppError> {
        let action = match self.store.find_action(action_key).await? {
            Some(action) => action,
            // Unknown keys fail closed.
            None => {
                return Ok(Decision {
                    ok: false,
                    source: DecisionSource::UnknownAction,
                })
            }
        };

        for rule in &self.rules {
            if let Some(decision) = rule.evaluate(self.store.as_ref(), principal, &action).await? {
                return Ok(decision);
            }
        }

        // DefaultRule always answers; reaching here is a bug in the chain.
        Err(AppError::InternalError(anyhow::anyhow!(
            "permission rule chain produced no decision for {}",
            action_key
        )))
    }

    /// Gate variant: a negative decision becomes a 403. Unauthenticated
    /// requests never reach here; the auth middleware answers 401 first.
    pub async fn require_action(
        &self,
        principal: &Principal,
        action_key: &str,
        cache: &DecisionCache,
    ) -> Result<(), AppError> {
        let decision = self.check_action(principal, action_key, cache).await?;
        if decision.ok {
            Ok(())
        } else {
            tracing::debug!(
                email = %principal.email,
                action = %action_key,
                source = ?decision.source,
                "Action denied"
            );
            Err(AppError::Forbidden(anyhow::anyhow!(
                "Not permitted: {}",
                action_key
            )))
        }
    }

    /// Page visibility: granted iff any assigned permission set carries the
    /// page key.
    pub async fn check_page(
        &self,
        principal: &Principal,
        page_key: &str,
    ) -> Result<bool, AppError> {
        self.store
            .has_set_page_grant(principal, principal.derived_role(), page_key)
            .await
    }

    pub fn store(&self) -> &Arc<dyn PermissionStore> {
        &self.store
    }
}
