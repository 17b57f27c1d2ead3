use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::admin::{CreatePermissionActionRequest, UpdatePermissionActionRequest},
    dtos::MessageResponse,
    middleware::RequestAuth,
    utils::ValidatedJson,
    AppState,
};

pub async fn list_actions(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.admin.list_actions().await?))
}

pub async fn create_action(
    State(state): State<AppState>,
    auth: RequestAuth,
    ValidatedJson(req): ValidatedJson<CreatePermissionActionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let action = state
        .admin
        .create_action(
            &auth.principal.email,
            req.action_key,
            req.pack,
            req.label,
            req.default_enabled,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(action)))
}

pub async fn get_action(
    State(state): State<AppState>,
    Path(action_key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.admin.get_action(&action_key).await?))
}

pub async fn update_action(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path(action_key): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdatePermissionActionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let action = state
        .admin
        .update_action(
            &auth.principal.email,
            &action_key,
            req.label,
            req.default_enabled,
        )
        .await?;
    Ok(Json(action))
}

pub async fn delete_action(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path(action_key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state
        .admin
        .delete_action(&auth.principal.email, &action_key)
        .await?;
    Ok(Json(MessageResponse::new("Permission action deleted")))
}
