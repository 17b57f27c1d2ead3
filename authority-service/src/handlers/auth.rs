//! Session authority HTTP surface: login/refresh/logout family plus the
//! single-use token flows.

use axum::{
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use std::net::SocketAddr;

use crate::{
    dtos::auth::{
        EmailRequest, LoginRequest, LogoutRequest, MagicLinkVerifyRequest, RefreshRequest,
        RegisterRequest, ResetPasswordRequest, ValidateRequest, VerifyCodeRequest, VerifyQuery,
    },
    dtos::MessageResponse,
    handlers::client_meta,
    middleware::AuthUser,
    utils::ValidatedJson,
    AppState,
};

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.sessions.register(req).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = client_meta(Some(addr), &headers);
    let res = state.sessions.login(req, meta).await?;
    Ok((StatusCode::OK, Json(res)))
}

pub async fn refresh(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = client_meta(Some(addr), &headers);
    let res = state.sessions.refresh(&req.refresh_token, meta).await?;
    Ok((StatusCode::OK, Json(res)))
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<LogoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.sessions.logout(&user.0.email, &req.refresh_token).await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Logged out successfully")),
    ))
}

pub async fn logout_all(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let revoked = state.sessions.logout_all(&user.0.email).await?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "All sessions revoked",
            "revoked": revoked,
        })),
    ))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<impl IntoResponse, AppError> {
    state.sessions.verify_email(&query.token).await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Email verified successfully")),
    ))
}

pub async fn verify_code(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.sessions.verify_email_code(&req.email, &req.code).await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Email verified successfully")),
    ))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<EmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.sessions.resend_verification(&req.email).await?;
    // Uniform response regardless of account state.
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new(
            "If the account exists, a verification email has been sent",
        )),
    ))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<EmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.sessions.forgot_password(&req.email).await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new(
            "If the account exists, a reset email has been sent",
        )),
    ))
}

pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.sessions.reset_password(&req.token, req.new_password).await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Password has been reset")),
    ))
}

pub async fn magic_link_request(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<EmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.sessions.magic_link_request(&req.email).await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new(
            "If the account exists, a sign-in link has been sent",
        )),
    ))
}

pub async fn magic_link_verify(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<MagicLinkVerifyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = client_meta(Some(addr), &headers);
    let res = state.sessions.magic_link_verify(&req.token, meta).await?;
    Ok((StatusCode::OK, Json(res)))
}

pub async fn validate(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> impl IntoResponse {
    Json(state.sessions.validate(&req.token))
}
