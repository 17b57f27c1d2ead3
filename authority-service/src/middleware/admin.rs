use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::middleware::auth::RequestAuth;
use crate::services::{ExpansionMode, ADMIN_GATE_ACTION};
use crate::AppState;

/// Gate for admin-prefixed routes. Runs after `auth_middleware`, re-expands
/// the principal in strict mode (a partial group set must not widen or
/// narrow an admin decision silently) and requires the admin action before
/// any business logic executes.
pub async fn admin_gate_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(auth) = request.extensions().get::<RequestAuth>().cloned() else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Missing bearer token or session cookie" })),
        )
            .into_response();
    };

    let principal = match state
        .principals
        .expand(&auth.claims, &[], ExpansionMode::Strict)
        .await
    {
        Ok(principal) => principal,
        Err(e) => {
            tracing::error!(error = %e, "Strict principal expansion failed at admin gate");
            return e.into_response();
        }
    };

    if let Err(e) = state
        .permissions
        .require_action(&principal, ADMIN_GATE_ACTION, &auth.cache)
        .await
    {
        tracing::warn!(email = %principal.email, "Admin gate denied");
        return e.into_response();
    }

    // Downstream handlers see the strictly-expanded principal.
    request.extensions_mut().insert(RequestAuth {
        claims: auth.claims,
        principal,
        cache: auth.cache,
    });

    next.run(request).await
}
