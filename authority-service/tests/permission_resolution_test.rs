//! Precedence-chain behavior of the action permission resolver.

mod common;

use authority_service::services::permission::{
    DecisionCache, DecisionSource, PermissionResolver,
};
use common::{principal, MemorySet, MemoryStore};
use std::sync::Arc;
use uuid::Uuid;

fn resolver(store: Arc<MemoryStore>) -> PermissionResolver {
    PermissionResolver::new(store)
}

#[tokio::test]
async fn unknown_action_fails_closed() {
    let store = Arc::new(MemoryStore::new());
    let resolver = resolver(store);
    let user = principal("u@example.com", &["user"], &[]);

    let decision = resolver
        .check_action(&user, "never.registered", &DecisionCache::new())
        .await
        .unwrap();

    assert!(!decision.ok);
    assert_eq!(decision.source, DecisionSource::UnknownAction);
}

#[tokio::test]
async fn default_disabled_action_resolves_from_default() {
    // A user with no overrides, grants or groups, role=user, and an action
    // with default_enabled=false and no role row.
    let store = Arc::new(MemoryStore::new());
    store.register_action("reports.export", false);
    let resolver = resolver(store);
    let user = principal("u@example.com", &["user"], &[]);

    let decision = resolver
        .check_action(&user, "reports.export", &DecisionCache::new())
        .await
        .unwrap();

    assert!(!decision.ok);
    assert_eq!(decision.source, DecisionSource::Default);
}

#[tokio::test]
async fn user_override_flips_the_default() {
    let store = Arc::new(MemoryStore::new());
    store.register_action("reports.export", false);
    store.set_user_override("u@example.com", "reports.export", true);
    let resolver = resolver(store);
    let user = principal("u@example.com", &["user"], &[]);

    let decision = resolver
        .check_action(&user, "reports.export", &DecisionCache::new())
        .await
        .unwrap();

    assert!(decision.ok);
    assert_eq!(decision.source, DecisionSource::UserOverride);
}

#[tokio::test]
async fn user_override_beats_every_other_layer() {
    // default-enabled, set-granted and role-granted, but a false override
    // still denies.
    let group = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.register_action("reports.export", true);
    store.add_set(MemorySet {
        users: vec!["u@example.com".to_string()],
        action_grants: vec!["reports.export".to_string()],
        ..Default::default()
    });
    store.set_role_permission("user", "reports.export", true);
    store.set_group_permission(group, "reports.export", true);
    store.set_user_override("u@example.com", "reports.export", false);
    let resolver = resolver(store);
    let user = principal("u@example.com", &["user"], &[group]);

    let decision = resolver
        .check_action(&user, "reports.export", &DecisionCache::new())
        .await
        .unwrap();

    assert!(!decision.ok);
    assert_eq!(decision.source, DecisionSource::UserOverride);
}

#[tokio::test]
async fn permission_set_grant_allows_via_any_assignment_path() {
    let group = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.register_action("invoices.approve", false);
    store.add_set(MemorySet {
        groups: vec![group],
        action_grants: vec!["invoices.approve".to_string()],
        ..Default::default()
    });
    let resolver = resolver(store);
    let user = principal("u@example.com", &["user"], &[group]);

    let decision = resolver
        .check_action(&user, "invoices.approve", &DecisionCache::new())
        .await
        .unwrap();

    assert!(decision.ok);
    assert_eq!(decision.source, DecisionSource::PermissionSet);
}

#[tokio::test]
async fn set_grant_is_decisive_before_group_deny() {
    // Layer order: a set grant answers before the group layer is consulted.
    let group = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.register_action("invoices.approve", false);
    store.add_set(MemorySet {
        users: vec!["u@example.com".to_string()],
        action_grants: vec!["invoices.approve".to_string()],
        ..Default::default()
    });
    store.set_group_permission(group, "invoices.approve", false);
    let resolver = resolver(store);
    let user = principal("u@example.com", &["user"], &[group]);

    let decision = resolver
        .check_action(&user, "invoices.approve", &DecisionCache::new())
        .await
        .unwrap();

    assert!(decision.ok);
    assert_eq!(decision.source, DecisionSource::PermissionSet);
}

#[tokio::test]
async fn group_deny_wins_over_group_allow() {
    let g1 = Uuid::new_v4();
    let g2 = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.register_action("records.purge", true);
    store.set_group_permission(g1, "records.purge", true);
    store.set_group_permission(g2, "records.purge", false);
    let resolver = resolver(store);
    let user = principal("u@example.com", &["user"], &[g1, g2]);

    let decision = resolver
        .check_action(&user, "records.purge", &DecisionCache::new())
        .await
        .unwrap();

    assert!(!decision.ok);
    assert_eq!(decision.source, DecisionSource::GroupActionPermission);
}

#[tokio::test]
async fn role_row_answers_when_higher_layers_are_silent() {
    let store = Arc::new(MemoryStore::new());
    store.register_action("records.purge", false);
    store.set_role_permission("admin", "records.purge", true);
    let resolver = resolver(store);

    let admin = principal("a@example.com", &["admin"], &[]);
    let decision = resolver
        .check_action(&admin, "records.purge", &DecisionCache::new())
        .await
        .unwrap();
    assert!(decision.ok);
    assert_eq!(decision.source, DecisionSource::RoleActionPermission);

    // The derived role is binary: any non-admin role set resolves as 'user'.
    let user = principal("u@example.com", &["auditor"], &[]);
    let decision = resolver
        .check_action(&user, "records.purge", &DecisionCache::new())
        .await
        .unwrap();
    assert!(!decision.ok);
    assert_eq!(decision.source, DecisionSource::Default);
}

#[tokio::test]
async fn decisions_cache_within_one_request_only() {
    let store = Arc::new(MemoryStore::new());
    store.register_action("reports.export", false);
    let resolver = PermissionResolver::new(store.clone());
    let user = principal("u@example.com", &["user"], &[]);

    let request_cache = DecisionCache::new();
    let first = resolver
        .check_action(&user, "reports.export", &request_cache)
        .await
        .unwrap();
    assert!(!first.ok);

    // State changes mid-request do not alter decisions already made in this
    // request...
    store.set_user_override("u@example.com", "reports.export", true);
    let cached = resolver
        .check_action(&user, "reports.export", &request_cache)
        .await
        .unwrap();
    assert!(!cached.ok);
    assert_eq!(cached.source, DecisionSource::Default);

    // ...while the next request sees the new state.
    let next_request = resolver
        .check_action(&user, "reports.export", &DecisionCache::new())
        .await
        .unwrap();
    assert!(next_request.ok);
    assert_eq!(next_request.source, DecisionSource::UserOverride);
}

#[tokio::test]
async fn cache_is_keyed_by_principal() {
    let store = Arc::new(MemoryStore::new());
    store.register_action("reports.export", false);
    store.set_user_override("a@example.com", "reports.export", true);
    let resolver = resolver(store);

    let shared_cache = DecisionCache::new();
    let a = principal("a@example.com", &["user"], &[]);
    let b = principal("b@example.com", &["user"], &[]);

    let decision_a = resolver
        .check_action(&a, "reports.export", &shared_cache)
        .await
        .unwrap();
    let decision_b = resolver
        .check_action(&b, "reports.export", &shared_cache)
        .await
        .unwrap();

    assert!(decision_a.ok);
    assert!(!decision_b.ok);
}

#[tokio::test]
async fn require_action_maps_denial_to_forbidden() {
    let store = Arc::new(MemoryStore::new());
    store.register_action("reports.export", false);
    let resolver = resolver(store);
    let user = principal("u@example.com", &["user"], &[]);

    let err = resolver
        .require_action(&user, "reports.export", &DecisionCache::new())
        .await
        .unwrap_err();

    assert!(matches!(err, service_core::error::AppError::Forbidden(_)));
}

#[tokio::test]
async fn page_check_requires_a_set_grant() {
    let store = Arc::new(MemoryStore::new());
    store.add_set(MemorySet {
        roles: vec!["user".to_string()],
        page_grants: vec!["billing.invoices".to_string()],
        ..Default::default()
    });
    let resolver = resolver(store);
    let user = principal("u@example.com", &["user"], &[]);

    assert!(resolver.check_page(&user, "billing.invoices").await.unwrap());
    assert!(!resolver.check_page(&user, "billing.refunds").await.unwrap());
}
