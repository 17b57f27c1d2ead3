//! Principal expansion - turns verified token claims into the identity the
//! resolvers work with, including authoritative group membership.

use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

use super::group_source::GroupSource;
use super::permission::Principal;
use super::token::AccessTokenClaims;
use crate::utils::normalize_email;

/// What happens when the group source cannot be reached.
///
/// `Strict` makes the failure the request's failure and is mandatory for the
/// admin and impersonation gates. `Lenient` logs and proceeds with the
/// partial group set - an explicit availability-over-completeness choice a
/// call site has to make, not a silent fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionMode {
    Strict,
    Lenient,
}

#[derive(Clone)]
pub struct PrincipalExpander {
    groups: Arc<dyn GroupSource>,
}

impl PrincipalExpander {
    pub fn new(groups: Arc<dyn GroupSource>) -> Self {
        Self { groups }
    }

    /// Expand claims into a principal. The group set is the union of
    /// token-embedded groups, the authoritative lookup, and any
    /// caller-supplied extras.
    pub async fn expand(
        &self,
        claims: &AccessTokenClaims,
        extra_groups: &[Uuid],
        mode: ExpansionMode,
    ) -> Result<Principal, AppError> {
        let user_id = claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| AppError::AuthError(anyhow::anyhow!("Malformed subject claim")))?;
        let email = normalize_email(&claims.email);

        let mut group_ids: Vec<Uuid> = claims.groups.clone().unwrap_or_default();

        match self.groups.group_ids_for(&email).await {
            Ok(fetched) => {
                for id in fetched {
                    if !group_ids.contains(&id) {
                        group_ids.push(id);
                    }
                }
            }
            Err(e) => match mode {
                ExpansionMode::Strict => {
                    return Err(AppError::InternalError(anyhow::anyhow!(
                        "Group lookup failed during strict expansion: {}",
                        e
                    )))
                }
                ExpansionMode::Lenient => {
                    tracing::warn!(
                        email = %email,
                        error = %e,
                        "Group lookup failed; continuing with partial group set"
                    );
                }
            },
        }

        for id in extra_groups {
            if !group_ids.contains(id) {
                group_ids.push(*id);
            }
        }

        Ok(Principal {
            user_id,
            email,
            roles: claims.roles.clone(),
            group_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedGroups(Vec<Uuid>);

    #[async_trait]
    impl GroupSource for FixedGroups {
        async fn group_ids_for(&self, _email: &str) -> Result<Vec<Uuid>, AppError> {
            Ok(self.0.clone())
        }
    }

    struct FailingGroups;

    #[async_trait]
    impl GroupSource for FailingGroups {
        async fn group_ids_for(&self, _email: &str) -> Result<Vec<Uuid>, AppError> {
            Err(AppError::InternalError(anyhow::anyhow!("upstream down")))
        }
    }

    fn claims_with_groups(groups: Option<Vec<Uuid>>) -> AccessTokenClaims {
        AccessTokenClaims {
            sub: Uuid::new_v4().to_string(),
            email: "User@Example.com".to_string(),
            role: "user".to_string(),
            roles: vec!["user".to_string()],
            email_verified: true,
            groups,
            impersonator_email: None,
            impersonation_session_id: None,
            exp: 0,
            iat: 0,
            jti: "jti".to_string(),
        }
    }

    #[tokio::test]
    async fn test_expansion_unions_and_dedupes() {
        let shared = Uuid::new_v4();
        let fetched_only = Uuid::new_v4();
        let extra = Uuid::new_v4();

        let expander = PrincipalExpander::new(Arc::new(FixedGroups(vec![shared, fetched_only])));
        let principal = expander
            .expand(
                &claims_with_groups(Some(vec![shared])),
                &[extra],
                ExpansionMode::Strict,
            )
            .await
            .unwrap();

        assert_eq!(principal.email, "user@example.com");
        assert_eq!(principal.group_ids.len(), 3);
        assert!(principal.group_ids.contains(&shared));
        assert!(principal.group_ids.contains(&fetched_only));
        assert!(principal.group_ids.contains(&extra));
    }

    #[tokio::test]
    async fn test_strict_mode_propagates_lookup_failure() {
        let expander = PrincipalExpander::new(Arc::new(FailingGroups));
        let result = expander
            .expand(&claims_with_groups(None), &[], ExpansionMode::Strict)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_lenient_mode_keeps_token_groups() {
        let token_group = Uuid::new_v4();
        let expander = PrincipalExpander::new(Arc::new(FailingGroups));
        let principal = expander
            .expand(
                &claims_with_groups(Some(vec![token_group])),
                &[],
                ExpansionMode::Lenient,
            )
            .await
            .unwrap();
        assert_eq!(principal.group_ids, vec![token_group]);
    }
}
