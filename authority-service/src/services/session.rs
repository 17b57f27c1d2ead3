//! Session authority - login, refresh rotation, logout, single-use token
//! flows and the bootstrap administrator path.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::dtos::auth::{LoginRequest, RegisterRequest, RegisterResponse, ValidateResponse};
use crate::models::{AuditEvent, RefreshToken, SingleUseToken, TokenFlow, User};
use crate::services::{
    audit::{self, AuditSink},
    notify::{self, NotificationSender, TemplateKind},
    token::{generate_numeric_code, generate_opaque_token, TokenHasher, TokenResponse, TokenService},
    Database, ServiceError,
};
use crate::utils::{hash_password, normalize_email, verify_password, Password, PasswordHashString};

/// Behavioral knobs the authority needs from configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub refresh_token_expiry_days: i64,
    pub require_email_verification: bool,
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_password: Option<String>,
}

/// Request metadata recorded on refresh-token rows and audit events.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Clone)]
pub struct SessionService {
    db: Database,
    tokens: TokenService,
    hasher: TokenHasher,
    notifier: Arc<dyn NotificationSender>,
    audit: Arc<dyn AuditSink>,
    settings: SessionSettings,
}

impl SessionService {
    pub fn new(
        db: Database,
        tokens: TokenService,
        hasher: TokenHasher,
        notifier: Arc<dyn NotificationSender>,
        audit: Arc<dyn AuditSink>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            db,
            tokens,
            hasher,
            notifier,
            audit,
            settings,
        }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, ServiceError> {
        let email = normalize_email(&req.email);

        if self.db.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(Password::new(req.password)).await?;
        let user = User::new(&email, password_hash.into_string(), req.display_name);
        self.db.insert_user(&user).await?;

        tracing::info!(user_id = %user.user_id, "User registered");
        audit::emit(
            &self.audit,
            AuditEvent::new(Some(email.clone()), "user.register", "User registered")
                .entity("user", user.user_id.to_string()),
        );

        self.issue_verification(&email).await?;

        Ok(RegisterResponse {
            user_id: user.user_id,
            message: "Registration successful. Please check your email to verify your account."
                .to_string(),
        })
    }

    pub async fn login(
        &self,
        req: LoginRequest,
        meta: ClientMeta,
    ) -> Result<TokenResponse, ServiceError> {
        let email = normalize_email(&req.email);

        let user = match self.db.find_user_by_email(&email).await? {
            Some(user) => user,
            None => match self.try_bootstrap_admin(&email, &req.password).await? {
                Some(user) => user,
                None => {
                    // Tag the real reason in audit; the caller sees the
                    // uniform message either way.
                    self.audit_login_failure(&email, "user_not_found", &meta);
                    return Err(ServiceError::InvalidCredentials);
                }
            },
        };

        if user.locked {
            self.audit_login_failure(&email, "account_locked", &meta);
            return Err(ServiceError::AccountLocked);
        }

        verify_password(
            Password::new(req.password),
            PasswordHashString::new(user.password_hash.clone()),
        )
        .await
        .map_err(|_| {
            self.audit_login_failure(&email, "bad_password", &meta);
            ServiceError::InvalidCredentials
        })?;

        if self.settings.require_email_verification && !user.email_verified {
            self.audit_login_failure(&email, "email_not_verified", &meta);
            return Err(ServiceError::EmailNotVerified);
        }

        self.db.update_last_login(&email).await?;

        let response = self.open_session(&user, &meta).await?;

        tracing::info!(user_id = %user.user_id, "User logged in");
        audit::emit(
            &self.audit,
            AuditEvent::new(Some(email), "auth.login", "Login succeeded")
                .entity("user", user.user_id.to_string())
                .request("POST", "/auth/login", meta.ip, meta.user_agent),
        );

        Ok(response)
    }

    /// Issue the access token and a fresh refresh-token row for a user whose
    /// credentials have already been accepted.
    async fn open_session(
        &self,
        user: &User,
        meta: &ClientMeta,
    ) -> Result<TokenResponse, ServiceError> {
        let access_token = self
            .tokens
            .issue_for_user(user, None, None)
            .map_err(ServiceError::Internal)?;

        let refresh_plaintext = generate_opaque_token();
        let refresh_row = RefreshToken::new(
            user.email.clone(),
            self.hasher.hash(&refresh_plaintext),
            self.settings.refresh_token_expiry_days,
            meta.ip.clone(),
            meta.user_agent.clone(),
        );
        self.db.insert_refresh_token(&refresh_row).await?;

        Ok(TokenResponse {
            access_token,
            refresh_token: refresh_plaintext,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.access_token_expiry_seconds(),
        })
    }

    /// The bootstrap path: when the configured bootstrap credentials are
    /// presented and no user row exists for that email, the administrator
    /// account is created transparently. Never fires once a row exists.
    async fn try_bootstrap_admin(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, ServiceError> {
        let (Some(boot_email), Some(boot_password)) = (
            self.settings.bootstrap_admin_email.as_deref(),
            self.settings.bootstrap_admin_password.as_deref(),
        ) else {
            return Ok(None);
        };

        if normalize_email(boot_email) != email
            || !constant_time_str_eq(password, boot_password)
        {
            return Ok(None);
        }

        let password_hash = hash_password(Password::new(password.to_string())).await?;
        let user = User::new_admin(email, password_hash.into_string());
        self.db.insert_user(&user).await?;

        tracing::info!(user_id = %user.user_id, "Bootstrap administrator created");
        audit::emit(
            &self.audit,
            AuditEvent::new(
                Some(email.to_string()),
                "auth.bootstrap_admin",
                "Bootstrap administrator created on first login",
            )
            .entity("user", user.user_id.to_string()),
        );

        Ok(Some(user))
    }

    /// Rotate a refresh token. Exactly one of two concurrent redemptions
    /// succeeds; the loser's hash no longer matches an unrevoked row and
    /// fails with an authentication error.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        meta: ClientMeta,
    ) -> Result<TokenResponse, ServiceError> {
        let hash = self.hasher.hash(refresh_token);

        let old_row = self
            .db
            .rotate_refresh_token(&hash)
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        let user = self
            .db
            .find_user_by_email(&old_row.user_email)
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        if user.locked {
            // The old row is already revoked, which is the bias we want:
            // failures force re-authentication rather than leaving a live
            // session.
            return Err(ServiceError::AccountLocked);
        }

        let response = self.open_session(&user, &meta).await?;

        tracing::info!(user_id = %user.user_id, "Refresh token rotated");
        audit::emit(
            &self.audit,
            AuditEvent::new(Some(user.email.clone()), "auth.refresh", "Refresh token rotated")
                .entity("refresh_token", old_row.token_id.to_string())
                .request("POST", "/auth/refresh", meta.ip, meta.user_agent),
        );

        Ok(response)
    }

    pub async fn logout(&self, email: &str, refresh_token: &str) -> Result<(), ServiceError> {
        let hash = self.hasher.hash(refresh_token);
        if !self.db.revoke_refresh_token(&hash).await? {
            return Err(ServiceError::InvalidToken);
        }

        tracing::info!(email = %email, "User logged out");
        audit::emit(
            &self.audit,
            AuditEvent::new(Some(email.to_string()), "auth.logout", "Session revoked"),
        );
        Ok(())
    }

    pub async fn logout_all(&self, email: &str) -> Result<u64, ServiceError> {
        let revoked = self.db.revoke_all_refresh_tokens(email).await?;

        tracing::info!(email = %email, revoked, "All sessions revoked");
        audit::emit(
            &self.audit,
            AuditEvent::new(
                Some(email.to_string()),
                "auth.logout_all",
                format!("{} sessions revoked", revoked),
            ),
        );
        Ok(revoked)
    }

    // ==================== Single-Use Token Flows ====================

    /// Issue a verification token plus short code and hand the plaintext to
    /// the notification collaborator. Hashes only are persisted.
    pub async fn issue_verification(&self, email: &str) -> Result<(), ServiceError> {
        let email = normalize_email(email);
        let token = generate_opaque_token();
        let code = generate_numeric_code();

        let row = SingleUseToken::new(
            TokenFlow::Verification,
            email.clone(),
            self.hasher.hash(&token),
            Some(self.hasher.hash(&code)),
        );
        self.db
            .insert_single_use_token(TokenFlow::Verification, &row)
            .await?;

        notify::send_detached(
            &self.notifier,
            email,
            TemplateKind::VerifyEmail,
            HashMap::from([("token".to_string(), token), ("code".to_string(), code)]),
        );
        Ok(())
    }

    /// Re-issue a verification token. Responds identically whether or not
    /// the account exists or is already verified.
    pub async fn resend_verification(&self, email: &str) -> Result<(), ServiceError> {
        if let Some(user) = self.db.find_user_by_email(email).await? {
            if !user.email_verified {
                self.issue_verification(email).await?;
            }
        }
        Ok(())
    }

    pub async fn verify_email(&self, token: &str) -> Result<(), ServiceError> {
        let hash = self.hasher.hash(token);
        let row = self
            .db
            .redeem_single_use_token(TokenFlow::Verification, &hash)
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        self.mark_verified(&row.email).await
    }

    pub async fn verify_email_code(&self, email: &str, code: &str) -> Result<(), ServiceError> {
        let row = self
            .db
            .redeem_verification_code(email, &self.hasher.hash(code))
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        self.mark_verified(&row.email).await
    }

    async fn mark_verified(&self, email: &str) -> Result<(), ServiceError> {
        if self.db.set_user_verified(email, true).await? == 0 {
            return Err(ServiceError::InvalidToken);
        }

        tracing::info!(email = %email, "Email verified");
        audit::emit(
            &self.audit,
            AuditEvent::new(Some(email.to_string()), "auth.verify_email", "Email verified"),
        );
        Ok(())
    }

    /// Request a password reset. The response is uniform; a token is issued
    /// only when the account exists.
    pub async fn forgot_password(&self, email: &str) -> Result<(), ServiceError> {
        let email = normalize_email(email);
        let Some(user) = self.db.find_user_by_email(&email).await? else {
            return Ok(());
        };

        let token = generate_opaque_token();
        let row = SingleUseToken::new(
            TokenFlow::PasswordReset,
            email.clone(),
            self.hasher.hash(&token),
            None,
        );
        self.db
            .insert_single_use_token(TokenFlow::PasswordReset, &row)
            .await?;

        notify::send_detached(
            &self.notifier,
            email.clone(),
            TemplateKind::PasswordReset,
            HashMap::from([("token".to_string(), token)]),
        );

        tracing::info!(user_id = %user.user_id, "Password reset requested");
        audit::emit(
            &self.audit,
            AuditEvent::new(Some(email), "auth.password_reset_request", "Password reset requested")
                .entity("user", user.user_id.to_string()),
        );
        Ok(())
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: String,
    ) -> Result<(), ServiceError> {
        let hash = self.hasher.hash(token);
        let row = self
            .db
            .redeem_single_use_token(TokenFlow::PasswordReset, &hash)
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        let password_hash = hash_password(Password::new(new_password)).await?;
        if self
            .db
            .update_user_password(&row.email, password_hash.as_str())
            .await?
            == 0
        {
            return Err(ServiceError::InvalidToken);
        }

        // A reset invalidates every open session for the account.
        self.db.revoke_all_refresh_tokens(&row.email).await?;

        tracing::info!(email = %row.email, "Password reset completed");
        audit::emit(
            &self.audit,
            AuditEvent::new(Some(row.email.clone()), "auth.password_reset", "Password reset"),
        );
        Ok(())
    }

    /// Request a magic link. Uniform response, like the reset flow.
    pub async fn magic_link_request(&self, email: &str) -> Result<(), ServiceError> {
        let email = normalize_email(email);
        if self.db.find_user_by_email(&email).await?.is_none() {
            return Ok(());
        }

        let token = generate_opaque_token();
        let row = SingleUseToken::new(
            TokenFlow::MagicLink,
            email.clone(),
            self.hasher.hash(&token),
            None,
        );
        self.db
            .insert_single_use_token(TokenFlow::MagicLink, &row)
            .await?;

        notify::send_detached(
            &self.notifier,
            email,
            TemplateKind::MagicLink,
            HashMap::from([("token".to_string(), token)]),
        );
        Ok(())
    }

    /// Redeem a magic link and open a session for its owner.
    pub async fn magic_link_verify(
        &self,
        token: &str,
        meta: ClientMeta,
    ) -> Result<TokenResponse, ServiceError> {
        let hash = self.hasher.hash(token);
        let row = self
            .db
            .redeem_single_use_token(TokenFlow::MagicLink, &hash)
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        let user = self
            .db
            .find_user_by_email(&row.email)
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        if user.locked {
            return Err(ServiceError::AccountLocked);
        }

        // A delivered link proves control of the mailbox.
        if !user.email_verified {
            self.db.set_user_verified(&user.email, true).await?;
        }

        self.db.update_last_login(&user.email).await?;
        let response = self.open_session(&user, &meta).await?;

        tracing::info!(user_id = %user.user_id, "Magic link redeemed");
        audit::emit(
            &self.audit,
            AuditEvent::new(Some(user.email.clone()), "auth.magic_link", "Magic link login")
                .entity("user", user.user_id.to_string())
                .request("POST", "/auth/magic-link/verify", meta.ip, meta.user_agent),
        );

        Ok(response)
    }

    pub async fn change_password(
        &self,
        email: &str,
        current_password: String,
        new_password: String,
    ) -> Result<(), ServiceError> {
        let user = self
            .db
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User".to_string()))?;

        verify_password(
            Password::new(current_password),
            PasswordHashString::new(user.password_hash.clone()),
        )
        .await
        .map_err(|_| ServiceError::InvalidCredentials)?;

        let password_hash = hash_password(Password::new(new_password)).await?;
        self.db
            .update_user_password(email, password_hash.as_str())
            .await?;
        self.db.revoke_all_refresh_tokens(email).await?;

        audit::emit(
            &self.audit,
            AuditEvent::new(Some(user.email), "auth.change_password", "Password changed"),
        );
        Ok(())
    }

    /// Token introspection for collaborators.
    pub fn validate(&self, token: &str) -> ValidateResponse {
        match self.tokens.verify(token) {
            Ok(claims) => ValidateResponse {
                active: true,
                sub: Some(claims.sub),
                email: Some(claims.email),
                role: Some(claims.role),
                impersonator_email: claims.impersonator_email,
                exp: Some(claims.exp),
                iat: Some(claims.iat),
            },
            Err(_) => ValidateResponse::inactive(),
        }
    }

    fn audit_login_failure(&self, email: &str, reason: &str, meta: &ClientMeta) {
        audit::emit(
            &self.audit,
            AuditEvent::new(Some(email.to_string()), "auth.login_failed", "Login failed")
                .details(serde_json::json!({ "reason": reason }))
                .request(
                    "POST",
                    "/auth/login",
                    meta.ip.clone(),
                    meta.user_agent.clone(),
                ),
        );
    }
}

/// Length-insensitive constant-time string comparison for the bootstrap
/// credential check.
fn constant_time_str_eq(a: &str, b: &str) -> bool {
    let a = Sha256::digest(a.as_bytes());
    let b = Sha256::digest(b.as_bytes());
    a.as_slice().ct_eq(b.as_slice()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_str_eq() {
        assert!(constant_time_str_eq("secret", "secret"));
        assert!(!constant_time_str_eq("secret", "Secret"));
        assert!(!constant_time_str_eq("secret", "secret-but-longer"));
    }
}
