//! Impersonation start/end. Start is gated on the admin action before any
//! session row exists; ending the caller's own session is self-service.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::auth::{ImpersonateEndRequest, ImpersonateRequest},
    middleware::RequestAuth,
    services::{ExpansionMode, ADMIN_GATE_ACTION},
    utils::ValidatedJson,
    AppState,
};

pub async fn start(
    State(state): State<AppState>,
    auth: RequestAuth,
    ValidatedJson(req): ValidatedJson<ImpersonateRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Strict expansion for the gate: an incomplete group set must not decide
    // an elevation.
    let principal = state
        .principals
        .expand(&auth.claims, &[], ExpansionMode::Strict)
        .await?;
    state
        .permissions
        .require_action(&principal, ADMIN_GATE_ACTION, &auth.cache)
        .await?;

    let started = state
        .impersonations
        .start(&principal.email, &req.email)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "session": started.session,
            "access_token": started.access_token,
            "token_type": "Bearer",
            "expires_in": started.expires_in,
        })),
    ))
}

pub async fn end(
    State(state): State<AppState>,
    auth: RequestAuth,
    Json(req): Json<ImpersonateEndRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (session_id, reason) = match req.session_id {
        // Ending by explicit id is an administrative act.
        Some(session_id) => {
            let principal = state
                .principals
                .expand(&auth.claims, &[], ExpansionMode::Strict)
                .await?;
            state
                .permissions
                .require_action(&principal, ADMIN_GATE_ACTION, &auth.cache)
                .await?;
            (session_id, "admin_end")
        }
        // Self-service: the id comes from the caller's own token.
        None => {
            let session_id = auth.claims.impersonation_session_id.ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!(
                    "Current session is not an impersonation session"
                ))
            })?;
            (session_id, "self_end")
        }
    };

    let actor = auth
        .claims
        .impersonator_email
        .as_deref()
        .unwrap_or(&auth.claims.email)
        .to_string();

    let session = state.impersonations.end(session_id, &actor, reason).await?;
    Ok((StatusCode::OK, Json(session)))
}
