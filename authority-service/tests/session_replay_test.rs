//! Refresh-token rotation against a real PostgreSQL instance.
//!
//! Ignored by default; set DATABASE_URL and run with `--ignored`.

use authority_service::config::{DatabaseConfig, TokenConfig};
use authority_service::dtos::auth::{LoginRequest, RegisterRequest};
use authority_service::services::{
    audit::NoopAuditSink, notify::NoopNotifier, ClientMeta, Database, ServiceError,
    SessionService, SessionSettings, TokenHasher, TokenService,
};
use std::sync::Arc;

async fn session_service() -> SessionService {
    let config = DatabaseConfig {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test"),
        max_connections: 5,
        min_connections: 1,
    };
    let pool = authority_service::db::create_pool(&config).await.unwrap();
    authority_service::db::run_migrations(&pool).await.unwrap();

    let tokens = TokenService::new(&TokenConfig {
        signing_secret: "integration-test-secret".to_string(),
        access_token_expiry_minutes: 15,
        refresh_token_expiry_days: 7,
    })
    .unwrap();

    SessionService::new(
        Database::new(pool),
        tokens,
        TokenHasher::new("integration-test-pepper").unwrap(),
        Arc::new(NoopNotifier),
        Arc::new(NoopAuditSink),
        SessionSettings {
            refresh_token_expiry_days: 7,
            require_email_verification: false,
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
        },
    )
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn refresh_token_replay_is_rejected() {
    let sessions = session_service().await;
    let email = format!("replay-{}@example.com", uuid::Uuid::new_v4());

    sessions
        .register(RegisterRequest {
            email: email.clone(),
            password: "correct-horse-battery".to_string(),
            display_name: None,
        })
        .await
        .unwrap();

    let tokens = sessions
        .login(
            LoginRequest {
                email: email.clone(),
                password: "correct-horse-battery".to_string(),
            },
            ClientMeta::default(),
        )
        .await
        .unwrap();

    // First redemption rotates and succeeds.
    let rotated = sessions
        .refresh(&tokens.refresh_token, ClientMeta::default())
        .await
        .unwrap();
    assert_ne!(rotated.refresh_token, tokens.refresh_token);

    // Replaying the already-rotated token fails with an auth error.
    let err = sessions
        .refresh(&tokens.refresh_token, ClientMeta::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidToken));

    // The rotated descendant is still redeemable exactly once.
    sessions
        .refresh(&rotated.refresh_token, ClientMeta::default())
        .await
        .unwrap();
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn concurrent_redemptions_have_one_winner() {
    let sessions = session_service().await;
    let email = format!("race-{}@example.com", uuid::Uuid::new_v4());

    sessions
        .register(RegisterRequest {
            email: email.clone(),
            password: "correct-horse-battery".to_string(),
            display_name: None,
        })
        .await
        .unwrap();

    let tokens = sessions
        .login(
            LoginRequest {
                email: email.clone(),
                password: "correct-horse-battery".to_string(),
            },
            ClientMeta::default(),
        )
        .await
        .unwrap();

    let a = sessions.refresh(&tokens.refresh_token, ClientMeta::default());
    let b = sessions.refresh(&tokens.refresh_token, ClientMeta::default());
    let (a, b) = tokio::join!(a, b);

    // Exactly one success and one authentication failure.
    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    let loser = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert!(matches!(loser, ServiceError::InvalidToken));
}
