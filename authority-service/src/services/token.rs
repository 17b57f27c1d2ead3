use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::config::TokenConfig;
use crate::models::User;

/// Signed session token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Email (lowercased identity key)
    pub email: String,
    /// Derived single role
    pub role: String,
    /// All roles carried by the principal
    pub roles: Vec<String>,
    pub email_verified: bool,
    /// Group ids embedded at issue time; principal expansion unions these
    /// with the authoritative lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<Uuid>>,
    /// True actor when this session impersonates another user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impersonator_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impersonation_session_id: Option<Uuid>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// JWT ID
    pub jti: String,
}

/// Token pair returned to the client after a successful auth flow.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Token issuance and verification, HMAC-SHA256 with a server-held secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
}

impl TokenService {
    /// Create the service from config. A missing signing secret is a fatal
    /// configuration error; the service never signs with an empty key.
    pub fn new(config: &TokenConfig) -> Result<Self, super::ServiceError> {
        if config.signing_secret.is_empty() {
            return Err(super::ServiceError::Configuration(
                "AUTH_SIGNING_SECRET is not set; refusing to issue unsigned tokens".to_string(),
            ));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.signing_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.signing_secret.as_bytes()),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
        })
    }

    /// Issue an access token for a user, optionally carrying impersonation
    /// provenance.
    pub fn issue_for_user(
        &self,
        user: &User,
        groups: Option<Vec<Uuid>>,
        impersonation: Option<(String, Uuid)>,
    ) -> Result<String, anyhow::Error> {
        let (impersonator_email, impersonation_session_id) = match impersonation {
            Some((email, session_id)) => (Some(email), Some(session_id)),
            None => (None, None),
        };

        let claims = AccessTokenClaims {
            sub: user.user_id.to_string(),
            email: user.email.clone(),
            role: user.role.clone(),
            roles: vec![user.role.clone()],
            email_verified: user.email_verified,
            groups,
            impersonator_email,
            impersonation_session_id,
            exp: 0,
            iat: 0,
            jti: String::new(),
        };

        self.issue(claims)
    }

    /// Sign claims with exp = now + TTL. `exp`/`iat`/`jti` are stamped here.
    pub fn issue(&self, mut claims: AccessTokenClaims) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        claims.iat = now.timestamp();
        claims.exp = (now + Duration::minutes(self.access_token_expiry_minutes)).timestamp();
        claims.jti = Uuid::new_v4().to_string();

        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))
    }

    /// Validate signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<AccessTokenClaims, anyhow::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| anyhow::anyhow!("Invalid access token: {}", e))?;

        Ok(token_data.claims)
    }

    /// Access token expiry in seconds (for client info)
    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }
}

type HmacSha256 = Hmac<Sha256>;

/// Deterministic, peppered hashing for opaque tokens (refresh and
/// single-use). Rows store only this hash, so a leaked table cannot be
/// replayed without the server-side pepper.
#[derive(Clone)]
pub struct TokenHasher {
    pepper: Vec<u8>,
}

impl TokenHasher {
    pub fn new(pepper: &str) -> Result<Self, super::ServiceError> {
        if pepper.is_empty() {
            return Err(super::ServiceError::Configuration(
                "TOKEN_PEPPER is not set".to_string(),
            ));
        }
        Ok(Self {
            pepper: pepper.as_bytes().to_vec(),
        })
    }

    pub fn hash(&self, token: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.pepper).expect("HMAC accepts keys of any length");
        mac.update(token.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Generate a high-entropy opaque token (32 random bytes, hex-encoded).
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate a short numeric code for the verification flow.
pub fn generate_numeric_code() -> String {
    let n = rand::Rng::gen_range(&mut rand::thread_rng(), 0..1_000_000u32);
    format!("{:06}", n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;

    fn test_config() -> TokenConfig {
        TokenConfig {
            signing_secret: "unit-test-secret".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        }
    }

    fn test_user() -> User {
        let mut user = User::new("test@example.com", "hash".to_string(), None);
        user.email_verified = true;
        user
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let config = TokenConfig {
            signing_secret: String::new(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        };
        assert!(TokenService::new(&config).is_err());
    }

    #[test]
    fn test_issue_verify_round_trip() {
        let service = TokenService::new(&test_config()).unwrap();
        let user = test_user();

        let token = service.issue_for_user(&user, None, None).unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.sub, user.user_id.to_string());
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.role, "user");
        assert!(claims.exp > claims.iat);
        assert!(claims.impersonator_email.is_none());
    }

    #[test]
    fn test_expired_token_fails_verification() {
        let service = TokenService::new(&TokenConfig {
            signing_secret: "unit-test-secret".to_string(),
            access_token_expiry_minutes: -5,
            refresh_token_expiry_days: 7,
        })
        .unwrap();

        let token = service.issue_for_user(&test_user(), None, None).unwrap();
        assert!(service.verify(&token).is_err());
    }

    #[test]
    fn test_impersonation_claims_survive_round_trip() {
        let service = TokenService::new(&test_config()).unwrap();
        let session_id = Uuid::new_v4();

        let token = service
            .issue_for_user(
                &test_user(),
                None,
                Some(("admin@example.com".to_string(), session_id)),
            )
            .unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.impersonator_email.as_deref(), Some("admin@example.com"));
        assert_eq!(claims.impersonation_session_id, Some(session_id));
    }

    #[test]
    fn test_token_hasher_is_deterministic_and_peppered() {
        let a = TokenHasher::new("pepper-a").unwrap();
        let b = TokenHasher::new("pepper-b").unwrap();

        assert_eq!(a.hash("tok"), a.hash("tok"));
        assert_ne!(a.hash("tok"), b.hash("tok"));
        assert_ne!(a.hash("tok"), "tok");
    }

    #[test]
    fn test_numeric_code_shape() {
        for _ in 0..32 {
            let code = generate_numeric_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
