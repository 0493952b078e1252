//! Outbound mail transports.
//!
//! A transport sends one composed message to one recipient using the
//! configuration it is handed on each call, so a saved config takes effect on
//! the next batch without rebuilding anything.

mod mock;
mod smtp;

pub use mock::{MockSmtpTransport, RecordedEmail};
pub use smtp::SmtpTransport;

use crate::error::NotificationResult;
use crate::models::TransportConfig;
use async_trait::async_trait;

/// Accepted message as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    /// Server response text, when it sent one.
    pub message_id: Option<String>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver exactly one HTML message. No retries happen here; every
    /// connect, TLS, auth, rejection or timeout failure comes back as `Err`.
    async fn send(
        &self,
        config: &TransportConfig,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> NotificationResult<SentEmail>;

    /// Connect (and upgrade to TLS when configured) without logging in or
    /// sending anything.
    async fn test_connection(&self, config: &TransportConfig) -> NotificationResult<()>;

    /// Transport name for logging.
    fn name(&self) -> &'static str;
}
