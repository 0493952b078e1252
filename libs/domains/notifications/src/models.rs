//! Domain models for the notifications domain.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::StringLen;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::{Validate, ValidationError};

// ============================================================================
// Transport configuration
// ============================================================================

/// How the SMTP session is secured before authentication.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AuthMode {
    /// Plain connection, no TLS upgrade
    #[sea_orm(string_value = "none")]
    None,
    #[default]
    #[sea_orm(string_value = "starttls")]
    Starttls,
}

/// Upper bound for a single SMTP exchange.
pub const MAX_TIMEOUT_SECONDS: u64 = 3600;

/// Active SMTP settings. Snapshots are append-only; the newest one wins.
///
/// `auth_principal` is both the login name and the envelope sender.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TransportConfig {
    #[validate(
        custom(function = "not_blank"),
        length(max = 100, message = "server must be at most 100 characters")
    )]
    pub server: String,
    #[validate(range(min = 1, message = "port must not be 0"))]
    pub port: u16,
    #[validate(
        email(message = "auth principal must be an email address"),
        length(max = 100, message = "auth principal must be at most 100 characters")
    )]
    pub auth_principal: String,
    /// Never serialized back out; see [`TransportConfigView`].
    #[serde(default, skip_serializing)]
    pub auth_secret: Option<String>,
    #[serde(default)]
    pub auth_mode: AuthMode,
    #[serde(default = "default_use_auth")]
    pub use_auth: bool,
    #[validate(range(
        min = 1,
        max = MAX_TIMEOUT_SECONDS,
        message = "timeout must be between 1 and 3600 seconds"
    ))]
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

fn default_use_auth() -> bool {
    true
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("server must not be empty".into());
        return Err(err);
    }
    Ok(())
}

impl TransportConfig {
    /// Per-exchange timeout, capped at [`MAX_TIMEOUT_SECONDS`] for rows
    /// stored before the bound existed.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.min(MAX_TIMEOUT_SECONDS))
    }

    /// Whether a login will be attempted on send.
    pub fn wants_login(&self) -> bool {
        self.use_auth && self.auth_secret.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn view(&self) -> TransportConfigView {
        TransportConfigView {
            server: self.server.clone(),
            port: self.port,
            auth_principal: self.auth_principal.clone(),
            has_secret: self.auth_secret.as_deref().is_some_and(|s| !s.is_empty()),
            auth_mode: self.auth_mode,
            use_auth: self.use_auth,
            timeout_seconds: self.timeout_seconds,
            max_retries: self.max_retries,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            server: "smtp.office365.com".to_string(),
            port: 587,
            auth_principal: "nearmiss@fresco.com".to_string(),
            auth_secret: None,
            auth_mode: AuthMode::Starttls,
            use_auth: true,
            timeout_seconds: 30,
            max_retries: 3,
        }
    }
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("auth_principal", &self.auth_principal)
            .field("auth_secret", &self.auth_secret.as_ref().map(|_| "<redacted>"))
            .field("auth_mode", &self.auth_mode)
            .field("use_auth", &self.use_auth)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Administrator-facing view of [`TransportConfig`] without the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfigView {
    pub server: String,
    pub port: u16,
    pub auth_principal: String,
    pub has_secret: bool,
    pub auth_mode: AuthMode,
    pub use_auth: bool,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

// ============================================================================
// Delivery queue
// ============================================================================

/// Lifecycle of a queue entry. `Sent` and `Failed` are terminal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryStatus {
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl DeliveryStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }
}

/// One message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub recipient_address: String,
    pub subject: String,
    pub body: String,
    pub related_report_id: Option<i64>,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
}

/// Input for [`crate::DeliveryQueue::enqueue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQueueEntry {
    pub recipient_address: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub related_report_id: Option<i64>,
}

impl NewQueueEntry {
    pub fn new(
        recipient_address: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipient_address: recipient_address.into(),
            subject: subject.into(),
            body: body.into(),
            related_report_id: None,
        }
    }

    pub fn for_report(mut self, report_id: i64) -> Self {
        self.related_report_id = Some(report_id);
        self
    }
}

/// Counts by status plus the newest entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub pending_count: u64,
    pub sent_count: u64,
    pub failed_count: u64,
    pub recent_entries: Vec<QueueEntrySummary>,
}

/// A queue entry without its body, for status listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntrySummary {
    pub id: Uuid,
    pub recipient_address: String,
    pub subject: String,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
}

impl From<QueueEntry> for QueueEntrySummary {
    fn from(entry: QueueEntry) -> Self {
        Self {
            id: entry.id,
            recipient_address: entry.recipient_address,
            subject: entry.subject,
            status: entry.status,
            created_at: entry.created_at,
            sent_at: entry.sent_at,
            retry_count: entry.retry_count,
        }
    }
}

// ============================================================================
// Audit history
// ============================================================================

/// Terminal outcome written to the audit trail.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HistoryOutcome {
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "failed")]
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub queue_entry_id: Uuid,
    pub recipient_address: String,
    pub subject: String,
    pub related_report_id: Option<i64>,
    pub sent_at: DateTime<Utc>,
    pub outcome: HistoryOutcome,
}

impl HistoryRecord {
    /// Record the terminal transition of `entry`, stamped now.
    pub fn for_entry(entry: &QueueEntry, outcome: HistoryOutcome) -> Self {
        Self {
            id: Uuid::now_v7(),
            queue_entry_id: entry.id,
            recipient_address: entry.recipient_address.clone(),
            subject: entry.subject.clone(),
            related_report_id: entry.related_report_id,
            sent_at: Utc::now(),
            outcome,
        }
    }
}

// ============================================================================
// Recipients
// ============================================================================

/// A user eligible to receive notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub address: String,
    pub plant: String,
}

/// A row of the user directory as the resolver sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub plant: String,
    pub is_admin: bool,
    pub is_supervisor: bool,
    pub has_credentials: bool,
}

impl DirectoryUser {
    /// Supervisors and admins who can log in.
    pub fn is_eligible(&self) -> bool {
        (self.is_supervisor || self.is_admin) && self.has_credentials
    }
}

impl From<DirectoryUser> for Recipient {
    fn from(user: DirectoryUser) -> Self {
        Self {
            name: format!("{} {}", user.first_name, user.last_name),
            address: user.email,
            plant: user.plant,
        }
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    NewReport,
    HighPriority,
    Update,
}

/// Report context supplied by the reporting application.
///
/// Values are pre-formatted for display. Missing fields render as "N/A" or
/// a per-field fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportPayload {
    pub report_id: Option<i64>,
    pub date_occurred: Option<String>,
    pub time_occurred: Option<String>,
    pub employee_name: Option<String>,
    pub plant: Option<String>,
    pub dept_name: Option<String>,
    pub equipment_area: Option<String>,
    pub hazard_assessment: Option<String>,
    pub description: Option<String>,
    pub immediate_action: Option<String>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Subject and HTML body produced by the composer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    pub subject: String,
    pub html_body: String,
}

/// Result of a report notification fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyOutcome {
    pub recipients: usize,
    pub queued: usize,
    pub failed: usize,
}

impl NotifyOutcome {
    pub fn all_queued(&self) -> bool {
        self.recipients > 0 && self.failed == 0
    }
}

// ============================================================================
// Queue processing
// ============================================================================

/// Tallies for one processor invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Another invocation held the single-flight guard; nothing was attempted.
    pub skipped: bool,
    pub attempted: usize,
    pub sent_count: usize,
    /// Failed attempts left pending for a later batch
    pub retried: usize,
    /// Entries moved to `Failed`
    pub failed: usize,
    /// Entries whose state could not be written (left for the next batch)
    pub errors: usize,
}

impl BatchOutcome {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}
