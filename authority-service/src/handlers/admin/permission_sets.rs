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
        AssignmentRequest, CreatePermissionSetRequest, GrantRequest, UpdatePermissionSetRequest,
    },
    dtos::MessageResponse,
    middleware::RequestAuth,
    models::{GrantKind, PrincipalType},
    utils::ValidatedJson,
    AppState,
};

fn parse_grant_kind(kind: &str) -> Result<GrantKind, AppError> {
    match kind {
        "page" => Ok(GrantKind::Page),
        "action" => Ok(GrantKind::Action),
        "metric" => Ok(GrantKind::Metric),
        other => Err(AppError::BadRequest(anyhow::anyhow!(
            "Unknown grant kind '{}'; expected page, action or metric",
            other
        ))),
    }
}

fn parse_principal_type(principal_type: &str) -> Result<PrincipalType, AppError> {
    match principal_type {
        "user" => Ok(PrincipalType::User),
        "group" => Ok(PrincipalType::Group),
        "role" => Ok(PrincipalType::Role),
        other => Err(AppError::BadRequest(anyhow::anyhow!(
            "Unknown principal type '{}'; expected user, group or role",
            other
        ))),
    }
}

pub async fn list_sets(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.permission_sets.list().await?))
}

pub async fn create_set(
    State(state): State<AppState>,
    auth: RequestAuth,
    ValidatedJson(req): ValidatedJson<CreatePermissionSetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let set = state
        .permission_sets
        .create(
            &auth.principal.email,
            req.name,
            req.description,
            req.template_role,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(set)))
}

pub async fn get_set(
    State(state): State<AppState>,
    Path(set_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.permission_sets.get(set_id).await?))
}

pub async fn update_set(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path(set_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdatePermissionSetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let set = state
        .permission_sets
        .update(
            &auth.principal.email,
            set_id,
            req.name,
            req.description,
            req.template_role,
        )
        .await?;
    Ok(Json(set))
}

pub async fn delete_set(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path(set_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_sets
        .delete(&auth.principal.email, set_id)
        .await?;
    Ok(Json(MessageResponse::new("Permission set deleted")))
}

pub async fn list_assignments(
    State(state): State<AppState>,
    Path(set_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.permission_sets.list_assignments(set_id).await?))
}

pub async fn add_assignment(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path(set_id): Path<Uuid>,
    Json(req): Json<AssignmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_sets
        .add_assignment(
            &auth.principal.email,
            set_id,
            req.principal_type,
            &req.principal_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::new("Assignment added"))))
}

pub async fn remove_assignment(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path((set_id, principal_type, principal_id)): Path<(Uuid, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let principal_type = parse_principal_type(&principal_type)?;
    state
        .permission_sets
        .remove_assignment(&auth.principal.email, set_id, principal_type, &principal_id)
        .await?;
    Ok(Json(MessageResponse::new("Assignment removed")))
}

pub async fn list_grants(
    State(state): State<AppState>,
    Path((set_id, kind)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, AppError> {
    let kind = parse_grant_kind(&kind)?;
    Ok(Json(state.permission_sets.list_grants(set_id, kind).await?))
}

pub async fn add_grant(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path((set_id, kind)): Path<(Uuid, String)>,
    ValidatedJson(req): ValidatedJson<GrantRequest>,
) -> Result<impl IntoResponse, AppError> {
    let kind = parse_grant_kind(&kind)?;
    state
        .permission_sets
        .add_grant(&auth.principal.email, set_id, kind, &req.grant_key)
        .await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::new("Grant added"))))
}

pub async fn remove_grant(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path((set_id, kind, grant_key)): Path<(Uuid, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let kind = parse_grant_kind(&kind)?;
    state
        .permission_sets
        .remove_grant(&auth.principal.email, set_id, kind, &grant_key)
        .await?;
    Ok(Json(MessageResponse::new("Grant removed")))
}
