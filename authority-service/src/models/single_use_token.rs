//! Single-use token model shared by the verification, password-reset and
//! magic-link flows. Three tables, one shape; `used_utc` is set exactly once.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// The three single-use flows. Each has its own table and expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFlow {
    Verification,
    PasswordReset,
    MagicLink,
}

impl TokenFlow {
    pub fn table(&self) -> &'static str {
        match self {
            TokenFlow::Verification => "verification_tokens",
            TokenFlow::PasswordReset => "password_reset_tokens",
            TokenFlow::MagicLink => "magic_link_tokens",
        }
    }

    /// Flow-specific lifetime: verification 24h, reset 2h, magic link 30m.
    pub fn ttl(&self) -> Duration {
        match self {
            TokenFlow::Verification => Duration::hours(24),
            TokenFlow::PasswordReset => Duration::hours(2),
            TokenFlow::MagicLink => Duration::minutes(30),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SingleUseToken {
    pub token_id: Uuid,
    pub email: String,
    pub token_hash: String,
    pub code_hash: Option<String>,
    pub expires_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
    pub used_utc: Option<DateTime<Utc>>,
}

impl SingleUseToken {
    pub fn new(flow: TokenFlow, email: String, token_hash: String, code_hash: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            token_id: Uuid::new_v4(),
            email,
            token_hash,
            code_hash,
            expires_utc: now + flow.ttl(),
            created_utc: now,
            used_utc: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_utc
    }

    pub fn is_redeemable(&self) -> bool {
        !self.is_expired() && self.used_utc.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_ttls() {
        assert_eq!(TokenFlow::Verification.ttl(), Duration::hours(24));
        assert_eq!(TokenFlow::PasswordReset.ttl(), Duration::hours(2));
        assert_eq!(TokenFlow::MagicLink.ttl(), Duration::minutes(30));
    }

    #[test]
    fn test_used_token_not_redeemable() {
        let mut token = SingleUseToken::new(
            TokenFlow::MagicLink,
            "a@b.com".to_string(),
            "hash".to_string(),
            None,
        );
        assert!(token.is_redeemable());
        token.used_utc = Some(Utc::now());
        assert!(!token.is_redeemable());
    }
}
