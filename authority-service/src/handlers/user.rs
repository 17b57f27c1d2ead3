//! Current-user endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::auth::{ChangePasswordRequest, UpdateMeRequest},
    dtos::MessageResponse,
    middleware::{AuthUser, RequestAuth},
    services::ServiceError,
    utils::ValidatedJson,
    AppState,
};

pub async fn get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .db
        .find_user_by_email(&user.0.email)
        .await
        .map_err(ServiceError::Database)?
        .ok_or_else(|| ServiceError::NotFound("User".to_string()))?;

    Ok(Json(record.sanitized()))
}

pub async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<UpdateMeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .db
        .find_user_by_email(&user.0.email)
        .await
        .map_err(ServiceError::Database)?
        .ok_or_else(|| ServiceError::NotFound("User".to_string()))?;

    state
        .db
        .update_user_profile(record.user_id, req.display_name, req.profile)
        .await
        .map_err(ServiceError::Database)?;

    let updated = state
        .db
        .find_user_by_id(record.user_id)
        .await
        .map_err(ServiceError::Database)?
        .ok_or_else(|| ServiceError::NotFound("User".to_string()))?;

    Ok(Json(updated.sanitized()))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .sessions
        .change_password(&user.0.email, req.current_password, req.new_password)
        .await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Password changed; all sessions revoked")),
    ))
}

/// The authoritative group view for the caller: the expanded id set plus
/// detail rows for the statically-stored groups.
pub async fn my_groups(
    State(state): State<AppState>,
    auth: RequestAuth,
) -> Result<impl IntoResponse, AppError> {
    let static_groups = state
        .db
        .groups_for_user_id(auth.principal.user_id)
        .await
        .map_err(ServiceError::Database)?;

    let details: Vec<serde_json::Value> = static_groups
        .iter()
        .map(|g| {
            serde_json::json!({
                "group_id": g.group_id,
                "name": g.name,
                "kind": g.kind,
            })
        })
        .collect();

    Ok(Json(serde_json::json!({
        "group_ids": auth.principal.group_ids,
        "static_groups": details,
    })))
}
