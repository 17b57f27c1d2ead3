pub mod admin;
pub mod audit;
pub mod error;
pub mod group_source;
pub mod impersonation;
pub mod notify;
pub mod org;
pub mod permission;
pub mod permission_set;
pub mod principal;
pub mod scope;
pub mod session;
pub mod store;
pub mod token;

pub use admin::AdminService;
pub use audit::{AuditSink, PgAuditSink};
pub use error::ServiceError;
pub use impersonation::ImpersonationService;
pub use notify::{NotificationSender, SmtpNotifier};
pub use permission::{DecisionCache, PermissionResolver, Principal, ADMIN_GATE_ACTION};
pub use permission_set::PermissionSetService;
pub use principal::{ExpansionMode, PrincipalExpander};
pub use scope::ScopeResolver;
pub use session::{ClientMeta, SessionService, SessionSettings};
pub use store::Database;
pub use token::{AccessTokenClaims, TokenHasher, TokenResponse, TokenService};
