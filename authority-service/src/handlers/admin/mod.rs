//! Admin surface. Every route here sits behind the admin action gate.

pub mod actions;
pub mod groups;
pub mod permission_sets;
pub mod users;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{middleware::RequestAuth, AppState};

/// Administrative end of any impersonation session by id.
pub async fn end_impersonation_session(
    State(state): State<AppState>,
    auth: RequestAuth,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .impersonations
        .end(session_id, &auth.principal.email, "admin_end")
        .await?;
    Ok(Json(session))
}
