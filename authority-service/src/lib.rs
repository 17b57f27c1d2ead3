pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::ip_rate_limit_middleware, security_headers::security_headers_middleware,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AuthorityConfig;
use crate::services::{
    AdminService, Database, ImpersonationService, PermissionResolver, PermissionSetService,
    PrincipalExpander, ScopeResolver, SessionService, TokenService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AuthorityConfig,
    pub db: Database,
    pub tokens: TokenService,
    pub sessions: SessionService,
    pub admin: AdminService,
    pub permission_sets: PermissionSetService,
    pub impersonations: ImpersonationService,
    pub permissions: Arc<PermissionResolver>,
    pub scopes: ScopeResolver,
    pub principals: PrincipalExpander,
    pub login_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
    pub register_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
    pub token_request_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
    pub ip_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Admin routes: auth first, then the admin action gate, before any
    // business logic.
    let admin_routes = Router::new()
        .route(
            "/admin/users",
            get(handlers::admin::users::list_users).post(handlers::admin::users::create_user),
        )
        .route(
            "/admin/users/:user_id",
            get(handlers::admin::users::get_user)
                .patch(handlers::admin::users::update_user)
                .delete(handlers::admin::users::delete_user),
        )
        .route(
            "/admin/users/:user_id/overrides/:action_key",
            axum::routing::put(handlers::admin::users::set_user_override)
                .delete(handlers::admin::users::clear_user_override),
        )
        .route(
            "/admin/roles/:role/permissions/:action_key",
            axum::routing::put(handlers::admin::users::set_role_permission)
                .delete(handlers::admin::users::clear_role_permission),
        )
        .route(
            "/admin/groups",
            get(handlers::admin::groups::list_groups).post(handlers::admin::groups::create_group),
        )
        .route(
            "/admin/groups/:group_id",
            get(handlers::admin::groups::get_group)
                .patch(handlers::admin::groups::update_group)
                .delete(handlers::admin::groups::delete_group),
        )
        .route(
            "/admin/groups/:group_id/members",
            get(handlers::admin::groups::list_members).post(handlers::admin::groups::add_member),
        )
        .route(
            "/admin/groups/:group_id/members/:user_id",
            delete(handlers::admin::groups::remove_member),
        )
        .route(
            "/admin/groups/:group_id/permissions/:action_key",
            axum::routing::put(handlers::admin::groups::set_group_permission)
                .delete(handlers::admin::groups::clear_group_permission),
        )
        .route(
            "/admin/permission-sets",
            get(handlers::admin::permission_sets::list_sets)
                .post(handlers::admin::permission_sets::create_set),
        )
        .route(
            "/admin/permission-sets/:set_id",
            get(handlers::admin::permission_sets::get_set)
                .patch(handlers::admin::permission_sets::update_set)
                .delete(handlers::admin::permission_sets::delete_set),
        )
        .route(
            "/admin/permission-sets/:set_id/assignments",
            get(handlers::admin::permission_sets::list_assignments)
                .post(handlers::admin::permission_sets::add_assignment),
        )
        .route(
            "/admin/permission-sets/:set_id/assignments/:principal_type/:principal_id",
            delete(handlers::admin::permission_sets::remove_assignment),
        )
        .route(
            "/admin/permission-sets/:set_id/grants/:kind",
            get(handlers::admin::permission_sets::list_grants)
                .post(handlers::admin::permission_sets::add_grant),
        )
        .route(
            "/admin/permission-sets/:set_id/grants/:kind/:grant_key",
            delete(handlers::admin::permission_sets::remove_grant),
        )
        .route(
            "/admin/permission-actions",
            get(handlers::admin::actions::list_actions)
                .post(handlers::admin::actions::create_action),
        )
        .route(
            "/admin/permission-actions/:action_key",
            get(handlers::admin::actions::get_action)
                .patch(handlers::admin::actions::update_action)
                .delete(handlers::admin::actions::delete_action),
        )
        .route(
            "/admin/impersonation-sessions/:session_id/end",
            post(handlers::admin::end_impersonation_session),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::admin_gate_middleware,
        ))
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    // Rate-limited public routes.
    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let register_route = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .layer(from_fn_with_state(
            state.register_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let token_request_routes = Router::new()
        .route("/auth/forgot-password", post(handlers::auth::forgot_password))
        .route(
            "/auth/resend-verification",
            post(handlers::auth::resend_verification),
        )
        .route(
            "/auth/magic-link/request",
            post(handlers::auth::magic_link_request),
        )
        .layer(from_fn_with_state(
            state.token_request_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    // Routes that require an authenticated caller.
    let authed_routes = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/logout-all", post(handlers::auth::logout_all))
        .route("/auth/impersonate", post(handlers::impersonation::start))
        .route("/auth/impersonate/end", post(handlers::impersonation::end))
        .route(
            "/users/me",
            get(handlers::user::get_me).patch(handlers::user::update_me),
        )
        .route("/users/me/password", post(handlers::user::change_password))
        .route("/users/me/groups", get(handlers::user::my_groups))
        .route("/authz/check-action", post(handlers::authz::check_action))
        .route("/authz/check-page", post(handlers::authz::check_page))
        .route("/authz/check-pages", post(handlers::authz::check_pages))
        .route("/authz/scope", post(handlers::authz::scope))
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/auth/verify", get(handlers::auth::verify_email))
        .route("/auth/verify-code", post(handlers::auth::verify_code))
        .route("/auth/reset-password", post(handlers::auth::reset_password))
        .route(
            "/auth/magic-link/verify",
            post(handlers::auth::magic_link_verify),
        )
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/validate", post(handlers::auth::validate))
        .merge(login_route)
        .merge(register_route)
        .merge(token_request_routes)
        .merge(authed_routes)
        .merge(admin_routes)
        .with_state(state.clone())
        // Global IP rate limiting
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        // Request tracing
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
                        .collect::<Vec<axum::http::HeaderValue>>(),
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PATCH,
                    axum::http::Method::PUT,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::AUTHORIZATION,
                    axum::http::header::CONTENT_TYPE,
                ])
                .allow_credentials(true),
        );

    Ok(app)
}

/// Service health check
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<axum::Json<serde_json::Value>, AppError> {
    state.db.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Database health check failed");
        AppError::DatabaseError(anyhow::anyhow!(e))
    })?;

    Ok(axum::Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "checks": {
            "postgres": "up"
        }
    })))
}
