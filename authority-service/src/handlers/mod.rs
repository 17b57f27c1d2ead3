pub mod admin;
pub mod auth;
pub mod authz;
pub mod impersonation;
pub mod user;

use axum::http::HeaderMap;
use std::net::SocketAddr;

use crate::services::ClientMeta;

/// Assemble the request metadata recorded on refresh rows and audit events.
/// Prefers the forwarded-for header when the service sits behind a proxy.
pub fn client_meta(addr: Option<SocketAddr>, headers: &HeaderMap) -> ClientMeta {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| addr.map(|a| a.ip().to_string()));

    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    ClientMeta { ip, user_agent }
}
