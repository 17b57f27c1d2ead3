use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::CookieJar;

use crate::dtos::ErrorResponse;
use crate::services::{AccessTokenClaims, DecisionCache, ExpansionMode, Principal};
use crate::AppState;

/// Cookie carrying the session token when no bearer header is present.
pub const SESSION_COOKIE: &str = "authority_session";

/// Everything downstream gates need from one authenticated request: the
/// verified claims, the expanded principal, and the request-scoped decision
/// cache. Dropped with the request.
#[derive(Clone)]
pub struct RequestAuth {
    pub claims: AccessTokenClaims,
    pub principal: Principal,
    pub cache: DecisionCache,
}

fn unauthorized(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

/// Pull the token from the Authorization header or the session cookie.
fn extract_token(req: &Request) -> Option<String> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    let jar = CookieJar::from_headers(req.headers());
    jar.get(SESSION_COOKIE).map(|c| c.value().to_string())
}

/// Middleware to require authentication. Verifies the token, expands the
/// principal (lenient mode; the admin gate re-expands strictly) and seeds
/// the request's decision cache.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let token = match extract_token(&req) {
        Some(token) => token,
        None => return Err(unauthorized("Missing bearer token or session cookie")),
    };

    let claims = match state.tokens.verify(&token) {
        Ok(claims) => claims,
        Err(_) => return Err(unauthorized("Invalid or expired token")),
    };

    let principal = state
        .principals
        .expand(&claims, &[], ExpansionMode::Lenient)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Principal expansion failed");
            unauthorized("Invalid or expired token")
        })?;

    let auth = RequestAuth {
        claims: claims.clone(),
        principal,
        cache: DecisionCache::new(),
    };

    // Claims stay available separately for handlers that only need identity.
    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}

/// Extractor for the verified claims of the current request.
pub struct AuthUser(pub AccessTokenClaims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<AccessTokenClaims>().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Auth claims missing from request extensions".to_string(),
            }),
        ))?;

        Ok(AuthUser(claims.clone()))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestAuth
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestAuth>()
            .cloned()
            .ok_or((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Request auth context missing from request extensions".to_string(),
                }),
            ))
    }
}
