//! Refresh token model - one row per issued token, hash only.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Stored refresh token. The plaintext never touches the database; the row
/// holds a peppered HMAC-SHA256 of it. Revocation is terminal.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub token_id: Uuid,
    pub user_email: String,
    pub token_hash: String,
    pub expires_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
    pub revoked_utc: Option<DateTime<Utc>>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RefreshToken {
    pub fn new(
        user_email: String,
        token_hash: String,
        ttl_days: i64,
        client_ip: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            token_id: Uuid::new_v4(),
            user_email,
            token_hash,
            expires_utc: now + Duration::days(ttl_days),
            created_utc: now,
            revoked_utc: None,
            client_ip,
            user_agent,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_utc
    }

    /// Valid means redeemable: not expired and never revoked.
    pub fn is_valid(&self) -> bool {
        !self.is_expired() && self.revoked_utc.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_is_valid() {
        let token = RefreshToken::new("a@b.com".to_string(), "hash".to_string(), 7, None, None);
        assert!(token.is_valid());
        assert!(!token.is_expired());
    }

    #[test]
    fn test_revoked_token_is_terminal() {
        let mut token = RefreshToken::new("a@b.com".to_string(), "hash".to_string(), 7, None, None);
        token.revoked_utc = Some(Utc::now());
        assert!(!token.is_valid());
    }

    #[test]
    fn test_expired_token_is_invalid() {
        let mut token = RefreshToken::new("a@b.com".to_string(), "hash".to_string(), 7, None, None);
        token.expires_utc = Utc::now() - Duration::seconds(1);
        assert!(!token.is_valid());
    }
}
