use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::admin::{
        ActionPermissionRequest, CreateGroupRequest, GroupMemberRequest, UpdateGroupRequest,
    },
    dtos::MessageResponse,
    middleware::RequestAuth,
    models::group::GroupResponse,
    utils::ValidatedJson,
    AppState,
};

fn to_response(group: crate::models::Group) -> Result<GroupResponse, AppError> {
    GroupResponse::try_from(group)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Corrupt group row: {}", e)))
}

pub async fn list_groups(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let groups = state.admin.list_groups().await?;
    let responses: Vec<GroupResponse> = groups
        .into_iter()
        .map(to_response)
        .collect::<Result<_, _>>()?;
    Ok(Json(responses))
}

pub async fn create_group(
    State(state): State<AppState>,
    auth: RequestAuth,
    ValidatedJson(req): ValidatedJson<CreateGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let group = state
        .admin
        .create_group(&auth.principal.email, req.name, req.description, req.kind)
        .await?;
    Ok((StatusCode::CREATED, Json(to_response(group)?)))
}

pub async fn get_group(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let group = state.admin.get_group(group_id).await?;
    Ok(Json(to_response(group)?))
}

pub async fn update_group(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path(group_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let group = state
        .admin
        .update_group(
            &auth.principal.email,
            group_id,
            req.name,
            req.description,
            req.kind,
        )
        .await?;
    Ok(Json(to_response(group)?))
}

pub async fn delete_group(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path(group_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.admin.delete_group(&auth.principal.email, group_id).await?;
    Ok(Json(MessageResponse::new("Group deleted")))
}

pub async fn list_members(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let member_ids = state.admin.list_group_members(group_id).await?;
    Ok(Json(serde_json::json!({ "user_ids": member_ids })))
}

pub async fn add_member(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path(group_id): Path<Uuid>,
    Json(req): Json<GroupMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .admin
        .add_group_member(&auth.principal.email, group_id, req.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::new("Member added"))))
}

pub async fn remove_member(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path((group_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .admin
        .remove_group_member(&auth.principal.email, group_id, user_id)
        .await?;
    Ok(Json(MessageResponse::new("Member removed")))
}

pub async fn set_group_permission(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path((group_id, action_key)): Path<(Uuid, String)>,
    Json(req): Json<ActionPermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .admin
        .set_group_permission(&auth.principal.email, group_id, &action_key, req.allowed)
        .await?;
    Ok(Json(MessageResponse::new("Group permission set")))
}

pub async fn clear_group_permission(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path((group_id, action_key)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .admin
        .clear_group_permission(&auth.principal.email, group_id, &action_key)
        .await?;
    Ok(Json(MessageResponse::new("Group permission cleared")))
}
