//! Group model - static membership lists and segment-backed dynamic groups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Closed variant for group kinds. Dynamic groups carry the segment key the
/// upstream membership service computes them from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GroupKind {
    Static,
    Dynamic { segment_key: String },
}

impl GroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKind::Static => "static",
            GroupKind::Dynamic { .. } => "dynamic",
        }
    }

    pub fn segment_key(&self) -> Option<&str> {
        match self {
            GroupKind::Static => None,
            GroupKind::Dynamic { segment_key } => Some(segment_key),
        }
    }

    /// Validate the loose (kind, segment_key) pair at the storage boundary.
    pub fn from_columns(kind: &str, segment_key: Option<String>) -> Result<Self, String> {
        match (kind, segment_key) {
            ("static", None) => Ok(GroupKind::Static),
            ("static", Some(_)) => Err("static groups must not carry a segment key".to_string()),
            ("dynamic", Some(segment_key)) => Ok(GroupKind::Dynamic { segment_key }),
            ("dynamic", None) => Err("dynamic groups require a segment key".to_string()),
            (other, _) => Err(format!("unknown group kind: {}", other)),
        }
    }
}

/// Group row as stored.
#[derive(Debug, Clone, FromRow)]
pub struct Group {
    pub group_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub kind: String,
    pub segment_key: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl Group {
    pub fn new(name: String, description: Option<String>, kind: GroupKind) -> Self {
        Self {
            group_id: Uuid::new_v4(),
            name,
            description,
            segment_key: kind.segment_key().map(str::to_string),
            kind: kind.as_str().to_string(),
            created_utc: Utc::now(),
        }
    }

    pub fn group_kind(&self) -> Result<GroupKind, String> {
        GroupKind::from_columns(&self.kind, self.segment_key.clone())
    }
}

/// Group response for API.
#[derive(Debug, Serialize)]
pub struct GroupResponse {
    pub group_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: GroupKind,
    pub created_utc: DateTime<Utc>,
}

impl TryFrom<Group> for GroupResponse {
    type Error = String;

    fn try_from(g: Group) -> Result<Self, Self::Error> {
        let kind = g.group_kind()?;
        Ok(Self {
            group_id: g.group_id,
            name: g.name,
            description: g.description,
            kind,
            created_utc: g.created_utc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        let g = Group::new(
            "field-sales".to_string(),
            None,
            GroupKind::Dynamic {
                segment_key: "sales.field".to_string(),
            },
        );
        assert_eq!(g.kind, "dynamic");
        assert_eq!(
            g.group_kind().unwrap().segment_key(),
            Some("sales.field")
        );
    }

    #[test]
    fn test_invalid_columns_rejected() {
        assert!(GroupKind::from_columns("dynamic", None).is_err());
        assert!(GroupKind::from_columns("static", Some("x".to_string())).is_err());
        assert!(GroupKind::from_columns("fuzzy", None).is_err());
    }
}
