pub mod admin;
pub mod auth;

pub use admin::admin_gate_middleware;
pub use auth::{auth_middleware, AuthUser, RequestAuth, SESSION_COOKIE};
