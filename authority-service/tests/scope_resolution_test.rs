//! Scope mode resolution: probe order, entity-specific vs pack-wide keys,
//! and the fail-safe default.

mod common;

use authority_service::models::OrgAssignments;
use authority_service::services::permission::{DecisionCache, PermissionResolver};
use authority_service::services::scope::{ScopeFilter, ScopeMode, ScopeResolver, ScopeVerb};
use common::{principal, MemoryOrgStore, MemoryStore};
use std::sync::Arc;
use uuid::Uuid;

fn scope_resolver(store: Arc<MemoryStore>, org: OrgAssignments) -> ScopeResolver {
    ScopeResolver::new(
        Arc::new(PermissionResolver::new(store)),
        Arc::new(MemoryOrgStore(org)),
    )
}

#[tokio::test]
async fn pack_wide_grant_applies_when_entity_key_is_absent() {
    // Only the pack-wide division key exists and is enabled.
    let store = Arc::new(MemoryStore::new());
    store.register_action("billing.read.scope.division", true);
    let scopes = scope_resolver(store, OrgAssignments::default());
    let user = principal("u@example.com", &["user"], &[]);

    let mode = scopes
        .resolve_scope_mode(
            &user,
            "billing",
            Some("invoices"),
            ScopeVerb::Read,
            &DecisionCache::new(),
        )
        .await
        .unwrap();

    assert_eq!(mode, ScopeMode::Division);
}

#[tokio::test]
async fn entity_specific_key_wins_over_pack_wide() {
    let store = Arc::new(MemoryStore::new());
    store.register_action("billing.invoices.read.scope.location", true);
    store.register_action("billing.read.scope.all", true);
    let scopes = scope_resolver(store, OrgAssignments::default());
    let user = principal("u@example.com", &["user"], &[]);

    let mode = scopes
        .resolve_scope_mode(
            &user,
            "billing",
            Some("invoices"),
            ScopeVerb::Read,
            &DecisionCache::new(),
        )
        .await
        .unwrap();

    assert_eq!(mode, ScopeMode::Location);
}

#[tokio::test]
async fn first_matching_mode_wins_in_probe_order() {
    // Both own and division resolve true; own comes first in the order.
    let store = Arc::new(MemoryStore::new());
    store.register_action("billing.invoices.read.scope.own", true);
    store.register_action("billing.invoices.read.scope.division", true);
    let scopes = scope_resolver(store, OrgAssignments::default());
    let user = principal("u@example.com", &["user"], &[]);

    let mode = scopes
        .resolve_scope_mode(
            &user,
            "billing",
            Some("invoices"),
            ScopeVerb::Read,
            &DecisionCache::new(),
        )
        .await
        .unwrap();

    assert_eq!(mode, ScopeMode::Own);
}

#[tokio::test]
async fn none_beats_wider_modes() {
    let store = Arc::new(MemoryStore::new());
    store.register_action("billing.invoices.read.scope.none", true);
    store.register_action("billing.invoices.read.scope.all", true);
    let scopes = scope_resolver(store, OrgAssignments::default());
    let user = principal("u@example.com", &["user"], &[]);

    let mode = scopes
        .resolve_scope_mode(
            &user,
            "billing",
            Some("invoices"),
            ScopeVerb::Read,
            &DecisionCache::new(),
        )
        .await
        .unwrap();

    assert_eq!(mode, ScopeMode::None);
}

#[tokio::test]
async fn unmatched_probes_default_to_own() {
    let store = Arc::new(MemoryStore::new());
    let scopes = scope_resolver(store, OrgAssignments::default());
    let user = principal("u@example.com", &["user"], &[]);

    let mode = scopes
        .resolve_scope_mode(
            &user,
            "billing",
            Some("invoices"),
            ScopeVerb::Write,
            &DecisionCache::new(),
        )
        .await
        .unwrap();

    assert_eq!(mode, ScopeMode::Own);
}

#[tokio::test]
async fn verbs_resolve_independently() {
    let store = Arc::new(MemoryStore::new());
    store.register_action("billing.invoices.read.scope.all", true);
    let scopes = scope_resolver(store, OrgAssignments::default());
    let user = principal("u@example.com", &["user"], &[]);

    let read = scopes
        .resolve_scope_mode(
            &user,
            "billing",
            Some("invoices"),
            ScopeVerb::Read,
            &DecisionCache::new(),
        )
        .await
        .unwrap();
    let delete = scopes
        .resolve_scope_mode(
            &user,
            "billing",
            Some("invoices"),
            ScopeVerb::Delete,
            &DecisionCache::new(),
        )
        .await
        .unwrap();

    assert_eq!(read, ScopeMode::All);
    assert_eq!(delete, ScopeMode::Own);
}

#[tokio::test]
async fn scope_filters_follow_the_mode() {
    let division = Uuid::new_v4();
    let location = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    let scopes = scope_resolver(
        store,
        OrgAssignments {
            division_ids: vec![division],
            department_ids: vec![],
            location_ids: vec![location],
        },
    );
    let user = principal("User@Example.com", &["user"], &[]);

    assert_eq!(
        scopes.scope_filter(&user, ScopeMode::None).await.unwrap(),
        ScopeFilter::DenyAll
    );
    // Ownership comparison normalizes to lowercase.
    assert_eq!(
        scopes.scope_filter(&user, ScopeMode::Own).await.unwrap(),
        ScopeFilter::OwnRows {
            email: "user@example.com".to_string()
        }
    );
    assert_eq!(
        scopes.scope_filter(&user, ScopeMode::Division).await.unwrap(),
        ScopeFilter::OrgIds(vec![division])
    );
    assert_eq!(
        scopes.scope_filter(&user, ScopeMode::Location).await.unwrap(),
        ScopeFilter::OrgIds(vec![location])
    );
    assert_eq!(
        scopes.scope_filter(&user, ScopeMode::All).await.unwrap(),
        ScopeFilter::Unrestricted
    );
}

#[tokio::test]
async fn scope_probes_inherit_the_precedence_chain() {
    // A user override on the synthetic key decides the probe, exactly like
    // any other action.
    let store = Arc::new(MemoryStore::new());
    store.register_action("billing.invoices.read.scope.all", false);
    store.set_user_override("u@example.com", "billing.invoices.read.scope.all", true);
    let scopes = scope_resolver(store, OrgAssignments::default());
    let user = principal("u@example.com", &["user"], &[]);

    let mode = scopes
        .resolve_scope_mode(
            &user,
            "billing",
            Some("invoices"),
            ScopeVerb::Read,
            &DecisionCache::new(),
        )
        .await
        .unwrap();

    assert_eq!(mode, ScopeMode::All);
}
