pub mod action_permission;
pub mod audit_event;
pub mod group;
pub mod impersonation;
pub mod org_assignment;
pub mod permission_action;
pub mod permission_set;
pub mod refresh_token;
pub mod single_use_token;
pub mod user;

pub use action_permission::{GroupActionPermission, RoleActionPermission, UserActionOverride};
pub use audit_event::AuditEvent;
pub use group::{Group, GroupKind};
pub use impersonation::ImpersonationSession;
pub use org_assignment::OrgAssignments;
pub use permission_action::PermissionAction;
pub use permission_set::{
    GrantKind, PermissionSet, PermissionSetAssignment, PermissionSetGrant, PrincipalType,
};
pub use refresh_token::RefreshToken;
pub use single_use_token::{SingleUseToken, TokenFlow};
pub use user::User;
