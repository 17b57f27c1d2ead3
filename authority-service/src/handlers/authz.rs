//! Decision endpoints consumed by pack handlers and the UI shell.

use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;
use std::collections::HashMap;

use crate::{
    dtos::authz::{
        CheckActionRequest, CheckActionResponse, CheckPageRequest, CheckPageResponse,
        CheckPagesRequest, CheckPagesResponse, ScopeRequest, ScopeResponse,
    },
    middleware::RequestAuth,
    utils::ValidatedJson,
    AppState,
};

pub async fn check_action(
    State(state): State<AppState>,
    auth: RequestAuth,
    ValidatedJson(req): ValidatedJson<CheckActionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let decision = state
        .permissions
        .check_action(&auth.principal, &req.action_key, &auth.cache)
        .await?;
    Ok(Json(CheckActionResponse::from(decision)))
}

pub async fn check_page(
    State(state): State<AppState>,
    auth: RequestAuth,
    ValidatedJson(req): ValidatedJson<CheckPageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ok = state
        .permissions
        .check_page(&auth.principal, &req.page_key)
        .await?;
    Ok(Json(CheckPageResponse { ok }))
}

pub async fn check_pages(
    State(state): State<AppState>,
    auth: RequestAuth,
    Json(req): Json<CheckPagesRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut results = HashMap::with_capacity(req.page_keys.len());
    for key in req.page_keys {
        let ok = state.permissions.check_page(&auth.principal, &key).await?;
        results.insert(key, ok);
    }
    Ok(Json(CheckPagesResponse { results }))
}

pub async fn scope(
    State(state): State<AppState>,
    auth: RequestAuth,
    ValidatedJson(req): ValidatedJson<ScopeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mode = state
        .scopes
        .resolve_scope_mode(
            &auth.principal,
            &req.pack,
            req.entity.as_deref(),
            req.verb,
            &auth.cache,
        )
        .await?;
    Ok(Json(ScopeResponse { mode }))
}
