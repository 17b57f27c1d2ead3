//! Scope mode resolution.
//!
//! Visibility breadth is modeled as one synthetic action per candidate mode,
//! probed through the normal permission chain in a fixed order. The six modes
//! are categories, not a ladder.

use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::org::OrgDimensionStore;
use super::permission::{DecisionCache, PermissionResolver, Principal};
use crate::utils::normalize_email;

/// Visibility mode for one (entity, verb) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    None,
    Own,
    Location,
    Department,
    Division,
    All,
}

impl ScopeMode {
    /// Fixed probe order. First mode whose synthetic key resolves true wins.
    pub const PROBE_ORDER: [ScopeMode; 6] = [
        ScopeMode::None,
        ScopeMode::Own,
        ScopeMode::Location,
        ScopeMode::Department,
        ScopeMode::Division,
        ScopeMode::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeMode::None => "none",
            ScopeMode::Own => "own",
            ScopeMode::Location => "location",
            ScopeMode::Department => "department",
            ScopeMode::Division => "division",
            ScopeMode::All => "all",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeVerb {
    Read,
    Write,
    Delete,
}

impl ScopeVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeVerb::Read => "read",
            ScopeVerb::Write => "write",
            ScopeVerb::Delete => "delete",
        }
    }
}

/// Typed synthetic scope key. The `Display` impl is the single canonical
/// serializer shared by producers and the matcher, so the wire format cannot
/// drift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeActionKey<'a> {
    pub pack: &'a str,
    pub entity: Option<&'a str>,
    pub verb: ScopeVerb,
    pub mode: ScopeMode,
}

impl fmt::Display for ScopeActionKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entity {
            Some(entity) => write!(
                f,
                "{}.{}.{}.scope.{}",
                self.pack,
                entity,
                self.verb.as_str(),
                self.mode.as_str()
            ),
            None => write!(
                f,
                "{}.{}.scope.{}",
                self.pack,
                self.verb.as_str(),
                self.mode.as_str()
            ),
        }
    }
}

/// The filter a consumer applies after resolution. `DenyAll` keeps callers
/// fail-closed even if they forget an explicit `none` check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
    DenyAll,
    OwnRows { email: String },
    OrgIds(Vec<Uuid>),
    Unrestricted,
}

#[derive(Clone)]
pub struct ScopeResolver {
    permissions: Arc<PermissionResolver>,
    org: Arc<dyn OrgDimensionStore>,
}

impl ScopeResolver {
    pub fn new(permissions: Arc<PermissionResolver>, org: Arc<dyn OrgDimensionStore>) -> Self {
        Self { permissions, org }
    }

    /// Resolve the visibility mode for (entity, verb). Entity-specific keys
    /// are probed first, then pack-wide keys; `own` is the safe default when
    /// nothing matches.
    pub async fn resolve_scope_mode(
        &self,
        principal: &Principal,
        pack: &str,
        entity: Option<&str>,
        verb: ScopeVerb,
        cache: &DecisionCache,
    ) -> Result<ScopeMode, AppError> {
        if entity.is_some() {
            if let Some(mode) = self.probe(principal, pack, entity, verb, cache).await? {
                return Ok(mode);
            }
        }

        if let Some(mode) = self.probe(principal, pack, None, verb, cache).await? {
            return Ok(mode);
        }

        Ok(ScopeMode::Own)
    }

    async fn probe(
        &self,
        principal: &Principal,
        pack: &str,
        entity: Option<&str>,
        verb: ScopeVerb,
        cache: &DecisionCache,
    ) -> Result<Option<ScopeMode>, AppError> {
        for mode in ScopeMode::PROBE_ORDER {
            let key = ScopeActionKey {
                pack,
                entity,
                verb,
                mode,
            }
            .to_string();
            let decision = self.permissions.check_action(principal, &key, cache).await?;
            if decision.ok {
                return Ok(Some(mode));
            }
        }
        Ok(None)
    }

    /// Turn a resolved mode into the row filter a consumer applies.
    pub async fn scope_filter(
        &self,
        principal: &Principal,
        mode: ScopeMode,
    ) -> Result<ScopeFilter, AppError> {
        match mode {
            ScopeMode::None => Ok(ScopeFilter::DenyAll),
            ScopeMode::Own => Ok(ScopeFilter::OwnRows {
                email: normalize_email(&principal.email),
            }),
            ScopeMode::All => Ok(ScopeFilter::Unrestricted),
            ScopeMode::Location | ScopeMode::Department | ScopeMode::Division => {
                let assignments = self.org.assignments_for(&principal.email).await?;
                let ids = match mode {
                    ScopeMode::Location => assignments.location_ids,
                    ScopeMode::Department => assignments.department_ids,
                    _ => assignments.division_ids,
                };
                Ok(ScopeFilter::OrgIds(ids))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_serializer_entity_specific() {
        let key = ScopeActionKey {
            pack: "billing",
            entity: Some("invoices"),
            verb: ScopeVerb::Read,
            mode: ScopeMode::Division,
        };
        assert_eq!(key.to_string(), "billing.invoices.read.scope.division");
    }

    #[test]
    fn test_key_serializer_pack_wide() {
        let key = ScopeActionKey {
            pack: "billing",
            entity: None,
            verb: ScopeVerb::Delete,
            mode: ScopeMode::None,
        };
        assert_eq!(key.to_string(), "billing.delete.scope.none");
    }

    #[test]
    fn test_probe_order_is_fixed() {
        let names: Vec<&str> = ScopeMode::PROBE_ORDER.iter().map(|m| m.as_str()).collect();
        assert_eq!(
            names,
            vec!["none", "own", "location", "department", "division", "all"]
        );
    }
}
