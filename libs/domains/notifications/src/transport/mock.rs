//! Scriptable transport for tests and local runs without a mail server.

use super::{SentEmail, Transport};
use crate::error::{NotificationError, NotificationResult};
use crate::models::TransportConfig;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// A message the mock accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Captures sent mail in memory.
///
/// Outcomes are taken from a script, one per `send` call, and fall back to
/// the default behaviour (succeed, or fail when built with [`failing`]) once
/// the script runs out. Clones share state.
///
/// [`failing`]: MockSmtpTransport::failing
#[derive(Debug, Clone, Default)]
pub struct MockSmtpTransport {
    sent: Arc<Mutex<Vec<RecordedEmail>>>,
    script: Arc<Mutex<VecDeque<Result<(), String>>>>,
    attempts: Arc<AtomicUsize>,
    failure_message: Option<String>,
    reachable: Option<bool>,
    delay: Option<Duration>,
}

impl MockSmtpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send fails with `message` unless scripted otherwise.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Queue outcomes for the next sends, in order.
    pub async fn script(&self, outcomes: impl IntoIterator<Item = Result<(), String>>) {
        self.script.lock().await.extend(outcomes);
    }

    /// Sleep this long inside every send.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Override what `test_connection` reports.
    pub fn with_reachable(mut self, reachable: bool) -> Self {
        self.reachable = Some(reachable);
        self
    }

    pub async fn sent_emails(&self) -> Vec<RecordedEmail> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Sends attempted, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn was_sent_to(&self, address: &str) -> bool {
        self.sent.lock().await.iter().any(|e| e.to == address)
    }
}

#[async_trait]
impl Transport for MockSmtpTransport {
    async fn send(
        &self,
        _config: &TransportConfig,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> NotificationResult<SentEmail> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = match self.script.lock().await.pop_front() {
            Some(outcome) => outcome,
            None => match &self.failure_message {
                Some(message) => Err(message.clone()),
                None => Ok(()),
            },
        };

        if let Err(message) = outcome {
            return Err(NotificationError::Transport(message));
        }

        let mut sent = self.sent.lock().await;
        sent.push(RecordedEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        });

        Ok(SentEmail {
            message_id: Some(format!("mock-{}", sent.len())),
        })
    }

    async fn test_connection(&self, config: &TransportConfig) -> NotificationResult<()> {
        let reachable = self.reachable.unwrap_or(self.failure_message.is_none());
        if reachable {
            Ok(())
        } else {
            Err(NotificationError::Transport(format!(
                "mock: {}:{} unreachable",
                config.server, config.port
            )))
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
