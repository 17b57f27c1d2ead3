//! Notification sender - hands plaintext single-use tokens to the delivery
//! collaborator. Fire-and-forget: a failed send never blocks an auth flow.

use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SmtpConfig;

/// Template kinds the engine triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    VerifyEmail,
    PasswordReset,
    MagicLink,
}

impl TemplateKind {
    fn subject(&self) -> &'static str {
        match self {
            TemplateKind::VerifyEmail => "Verify your email address",
            TemplateKind::PasswordReset => "Reset your password",
            TemplateKind::MagicLink => "Your sign-in link",
        }
    }
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(
        &self,
        to: &str,
        kind: TemplateKind,
        variables: HashMap<String, String>,
    ) -> Result<(), AppError>;
}

/// Fire-and-forget wrapper used by every call site. The triggering flow
/// continues regardless of delivery outcome.
pub fn send_detached(
    sender: &Arc<dyn NotificationSender>,
    to: String,
    kind: TemplateKind,
    variables: HashMap<String, String>,
) {
    let sender = sender.clone();
    tokio::spawn(async move {
        if let Err(e) = sender.send(&to, kind, variables).await {
            tracing::warn!(error = %e, to = %to, "Notification send failed");
        }
    });
}

#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: SmtpTransport,
    from_email: String,
    base_url: String,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig, base_url: String) -> Result<Self, AppError> {
        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e.to_string())))?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "SMTP notifier initialized");

        Ok(Self {
            mailer,
            from_email: config.user.clone(),
            base_url,
        })
    }

    fn render(&self, kind: TemplateKind, variables: &HashMap<String, String>) -> String {
        let token = variables.get("token").map(String::as_str).unwrap_or("");
        match kind {
            TemplateKind::VerifyEmail => {
                let code = variables.get("code").map(String::as_str).unwrap_or("");
                format!(
                    "Welcome! Confirm your address by visiting\n{}/auth/verify?token={}\n\nOr enter the code {} in the app.",
                    self.base_url, token, code
                )
            }
            TemplateKind::PasswordReset => format!(
                "A password reset was requested for this address.\n{}/reset-password?token={}\n\nIf you did not request this, ignore this message.",
                self.base_url, token
            ),
            TemplateKind::MagicLink => format!(
                "Sign in by visiting\n{}/auth/magic-link/verify?token={}\n\nThe link expires in 30 minutes.",
                self.base_url, token
            ),
        }
    }
}

#[async_trait]
impl NotificationSender for SmtpNotifier {
    async fn send(
        &self,
        to: &str,
        kind: TemplateKind,
        variables: HashMap<String, String>,
    ) -> Result<(), AppError> {
        let body = self.render(kind, &variables);
        let email = Message::builder()
            .from(self.from_email.parse().map_err(
                |e: lettre::address::AddressError| AppError::InternalError(e.into()),
            )?)
            .to(to
                .parse()
                .map_err(|e: lettre::address::AddressError| AppError::InternalError(e.into()))?)
            .subject(kind.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| AppError::InternalError(e.into()))?;

        // Send in the blocking pool to avoid stalling the async runtime.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::InternalError(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to, "Notification sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e.to_string(), to = %to, "Failed to send notification");
                Err(AppError::InternalError(anyhow::anyhow!(e.to_string())))
            }
        }
    }
}

/// Sender that drops everything. Used in tests and when SMTP is not
/// configured.
pub struct NoopNotifier;

#[async_trait]
impl NotificationSender for NoopNotifier {
    async fn send(
        &self,
        to: &str,
        kind: TemplateKind,
        _variables: HashMap<String, String>,
    ) -> Result<(), AppError> {
        tracing::debug!(to = %to, kind = ?kind, "Notification suppressed (noop sender)");
        Ok(())
    }
}
