use authority_service::{
    build_router,
    config::AuthorityConfig,
    services::{
        group_source::{CompositeGroupSource, PgGroupSource, UpstreamGroupSource},
        notify::NoopNotifier,
        org::PgOrgStore,
        AdminService, Database, ImpersonationService, PermissionResolver, PermissionSetService,
        PgAuditSink, PrincipalExpander, ScopeResolver, SessionService, SessionSettings,
        SmtpNotifier, TokenHasher, TokenService,
    },
    AppState,
};
use service_core::error::AppError;
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid. A missing signing secret
    // stops the process here.
    let config = AuthorityConfig::from_env()?;

    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting authority service"
    );

    // Database
    let pool = authority_service::db::create_pool(&config.database)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
    authority_service::db::run_migrations(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
    let db = Database::new(pool.clone());
    tracing::info!("Database initialized successfully");

    // Token services
    let tokens = TokenService::new(&config.token)?;
    let hasher = TokenHasher::new(&config.token_pepper)?;
    tracing::info!("Token service initialized");

    // Notification sender: SMTP when configured, otherwise a noop sink.
    let notifier: Arc<dyn authority_service::services::NotificationSender> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpNotifier::new(smtp, config.public_base_url.clone())?),
        None => {
            tracing::warn!("SMTP not configured; notifications will be dropped");
            Arc::new(NoopNotifier)
        }
    };

    // Audit sink
    let audit: Arc<dyn authority_service::services::AuditSink> =
        Arc::new(PgAuditSink::new(pool.clone()));

    // Group sources: local static membership, plus the upstream segment
    // service when configured (the only path that sees dynamic groups).
    let mut group_sources: Vec<Arc<dyn authority_service::services::group_source::GroupSource>> =
        vec![Arc::new(PgGroupSource::new(pool.clone()))];
    if let Some(base_url) = &config.upstream.base_url {
        group_sources.push(Arc::new(UpstreamGroupSource::new(
            base_url.clone(),
            config.upstream.service_token.clone(),
        )));
    }
    let principals = PrincipalExpander::new(Arc::new(CompositeGroupSource::new(group_sources)));

    // Resolvers
    let permissions = Arc::new(PermissionResolver::new(Arc::new(db.clone())));
    let scopes = ScopeResolver::new(
        permissions.clone(),
        Arc::new(PgOrgStore::new(pool.clone())),
    );

    // Domain services
    let sessions = SessionService::new(
        db.clone(),
        tokens.clone(),
        hasher,
        notifier,
        audit.clone(),
        SessionSettings {
            refresh_token_expiry_days: config.token.refresh_token_expiry_days,
            require_email_verification: config.auth.require_email_verification,
            bootstrap_admin_email: config.auth.bootstrap_admin_email.clone(),
            bootstrap_admin_password: config.auth.bootstrap_admin_password.clone(),
        },
    );
    let admin = AdminService::new(db.clone(), audit.clone());
    let permission_sets = PermissionSetService::new(db.clone(), audit.clone());
    let impersonations = ImpersonationService::new(db.clone(), tokens.clone(), audit.clone());

    // Rate limiters
    let login_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.login_attempts,
        config.rate_limit.login_window_seconds,
    );
    let register_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.register_attempts,
        config.rate_limit.register_window_seconds,
    );
    let token_request_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.token_request_attempts,
        config.rate_limit.token_request_window_seconds,
    );
    let ip_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
    );
    tracing::info!("Rate limiters initialized");

    let state = AppState {
        config: config.clone(),
        db,
        tokens,
        sessions,
        admin,
        permission_sets,
        impersonations,
        permissions,
        scopes,
        principals,
        login_rate_limiter,
        register_rate_limiter,
        token_request_rate_limiter,
        ip_rate_limiter,
    };

    let app = build_router(state).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
