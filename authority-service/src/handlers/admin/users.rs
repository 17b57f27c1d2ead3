use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::admin::{ActionPermissionRequest, CreateUserRequest, UpdateUserRequest},
    dtos::MessageResponse,
    middleware::RequestAuth,
    utils::ValidatedJson,
    AppState,
};

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let users = state.admin.list_users().await?;
    let sanitized: Vec<_> = users.iter().map(|u| u.sanitized()).collect();
    Ok(Json(sanitized))
}

pub async fn create_user(
    State(state): State<AppState>,
    auth: RequestAuth,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.admin.create_user(&auth.principal.email, req).await?;
    Ok((StatusCode::CREATED, Json(user.sanitized())))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.admin.get_user(user_id).await?;
    Ok(Json(user.sanitized()))
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path(user_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .admin
        .update_user(&auth.principal.email, user_id, req)
        .await?;
    Ok(Json(user.sanitized()))
}

pub async fn delete_user(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.admin.delete_user(&auth.principal.email, user_id).await?;
    Ok(Json(MessageResponse::new("User deleted")))
}

pub async fn set_user_override(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path((user_id, action_key)): Path<(Uuid, String)>,
    Json(req): Json<ActionPermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.admin.get_user(user_id).await?;
    state
        .admin
        .set_user_override(&auth.principal.email, &user.email, &action_key, req.allowed)
        .await?;
    Ok(Json(MessageResponse::new("Override set")))
}

pub async fn clear_user_override(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path((user_id, action_key)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.admin.get_user(user_id).await?;
    state
        .admin
        .clear_user_override(&auth.principal.email, &user.email, &action_key)
        .await?;
    Ok(Json(MessageResponse::new("Override cleared")))
}

pub async fn set_role_permission(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path((role, action_key)): Path<(String, String)>,
    Json(req): Json<ActionPermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .admin
        .set_role_permission(&auth.principal.email, &role, &action_key, req.allowed)
        .await?;
    Ok(Json(MessageResponse::new("Role permission set")))
}

pub async fn clear_role_permission(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path((role, action_key)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .admin
        .clear_role_permission(&auth.principal.email, &role, &action_key)
        .await?;
    Ok(Json(MessageResponse::new("Role permission cleared")))
}
