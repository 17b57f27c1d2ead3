use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::permission::{Decision, DecisionSource};
use crate::services::scope::{ScopeMode, ScopeVerb};

#[derive(Debug, Deserialize, Validate)]
pub struct CheckActionRequest {
    #[validate(length(min = 1, message = "Action key is required"))]
    pub action_key: String,
}

#[derive(Debug, Serialize)]
pub struct CheckActionResponse {
    pub ok: bool,
    pub source: DecisionSource,
}

impl From<Decision> for CheckActionResponse {
    fn from(d: Decision) -> Self {
        Self {
            ok: d.ok,
            source: d.source,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckPageRequest {
    #[validate(length(min = 1, message = "Page key is required"))]
    pub page_key: String,
}

#[derive(Debug, Serialize)]
pub struct CheckPageResponse {
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct CheckPagesRequest {
    pub page_keys: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckPagesResponse {
    pub results: std::collections::HashMap<String, bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ScopeRequest {
    #[validate(length(min = 1, message = "Pack is required"))]
    pub pack: String,

    pub entity: Option<String>,
    pub verb: ScopeVerb,
}

#[derive(Debug, Serialize)]
pub struct ScopeResponse {
    pub mode: ScopeMode,
}
