//! SMTP transport using lettre.

use super::{SentEmail, Transport};
use crate::error::{NotificationError, NotificationResult};
use crate::models::{AuthMode, TransportConfig};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::future::Future;
use tracing::{debug, info, warn};

/// Sends through the SMTP relay described by the active [`TransportConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpTransport;

impl SmtpTransport {
    pub fn new() -> Self {
        Self
    }

    /// One lettre transport per call; configs change at runtime and a relay
    /// connection is never reused across batches.
    fn build_transport(
        config: &TransportConfig,
        with_credentials: bool,
    ) -> NotificationResult<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = match config.auth_mode {
            AuthMode::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)?
            }
            AuthMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.server),
        };

        let mut builder = builder
            .port(config.port)
            .timeout(Some(config.timeout()));

        if with_credentials && config.wants_login() {
            if let Some(secret) = &config.auth_secret {
                builder = builder.credentials(Credentials::new(
                    config.auth_principal.clone(),
                    secret.clone(),
                ));
            }
        }

        Ok(builder.build())
    }

    fn build_message(
        config: &TransportConfig,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> NotificationResult<Message> {
        let from: Mailbox = config.auth_principal.parse()?;
        let to: Mailbox = to.parse()?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())?;

        Ok(message)
    }

    /// Bound the whole exchange, not just individual socket operations.
    async fn bounded<T, F>(config: &TransportConfig, fut: F) -> NotificationResult<T>
    where
        F: Future<Output = Result<T, lettre::transport::smtp::Error>>,
    {
        match tokio::time::timeout(config.timeout(), fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(NotificationError::Timeout(config.timeout_seconds)),
        }
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn send(
        &self,
        config: &TransportConfig,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> NotificationResult<SentEmail> {
        debug!(
            to = %to,
            server = %config.server,
            port = config.port,
            auth_mode = %config.auth_mode,
            login = config.wants_login(),
            "Sending email via SMTP"
        );

        let message = Self::build_message(config, to, subject, html_body)?;
        let transport = Self::build_transport(config, true)?;

        let response = Self::bounded(config, transport.send(message))
            .await
            .inspect_err(|e| warn!(to = %to, error = %e, "SMTP send failed"))?;

        let message_id = response.message().next().map(|s| s.to_string());
        info!(to = %to, message_id = ?message_id, "Email accepted by SMTP server");

        Ok(SentEmail { message_id })
    }

    async fn test_connection(&self, config: &TransportConfig) -> NotificationResult<()> {
        let transport = Self::build_transport(config, false)?;

        if Self::bounded(config, transport.test_connection()).await? {
            Ok(())
        } else {
            Err(NotificationError::Transport(format!(
                "{}:{} did not accept the connection",
                config.server, config.port
            )))
        }
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
