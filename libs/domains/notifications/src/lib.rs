//! Notifications Domain
//!
//! Asynchronous email notifications for near-miss reports.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Report commit  │  ← Reporting application
//! └────────┬────────┘
//!          │ notify_report
//! ┌────────▼────────┐
//! │ NotificationSvc │  ← Resolves recipients, composes, enqueues
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │   email_queue   │  ← Pending / Sent / Failed
//! └────────┬────────┘
//!          │ process_queue (lease + in-process guard)
//! ┌────────▼────────┐
//! │ QueueProcessor  │  ← Retry state machine, audit history
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │  SMTP transport │  ← lettre, bounded by timeout_seconds
//! └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_notifications::{
//!     NotificationKind, NotificationService, ProcessorSettings, Repositories, SmtpTransport,
//! };
//!
//! let service = NotificationService::new(
//!     Repositories::postgres(db),
//!     Arc::new(SmtpTransport::new()),
//!     ProcessorSettings::default(),
//! )?;
//!
//! // After the report is committed
//! service.notify_report(NotificationKind::NewReport, &payload).await;
//!
//! // From the scheduler
//! let outcome = service.process_queue().await;
//! ```

pub mod config_store;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod processor;
pub mod queue;
pub mod recipients;
pub mod repository;
pub mod service;
pub mod templates;
pub mod transport;

// Re-export commonly used types
pub use config_store::ConfigStore;
pub use error::{NotificationError, NotificationResult};
pub use memory::{
    InMemoryConfigRepository, InMemoryHistoryRepository, InMemoryLeaseRepository,
    InMemoryQueueRepository, InMemoryUserDirectory,
};
pub use models::{
    AuthMode, BatchOutcome, ComposedMessage, DeliveryStatus, DirectoryUser, HistoryOutcome,
    HistoryRecord, MAX_TIMEOUT_SECONDS, NewQueueEntry, NotificationKind, NotifyOutcome,
    QueueEntry, QueueEntrySummary, QueueStatus, Recipient, ReportPayload, TransportConfig,
    TransportConfigView,
};
pub use postgres::{
    PgConfigRepository, PgHistoryRepository, PgLeaseRepository, PgQueueRepository,
    PgUserDirectory,
};
pub use processor::{DEFAULT_BATCH_SIZE, ProcessorSettings, QueueProcessor};
pub use queue::{DEFAULT_RECENT_LIMIT, DeliveryQueue};
pub use recipients::RecipientResolver;
pub use repository::{
    ConfigRepository, HistoryRepository, LeaseRepository, QueueRepository, UserDirectory,
};
pub use service::{NotificationService, Repositories};
pub use templates::MessageComposer;
pub use transport::{MockSmtpTransport, RecordedEmail, SentEmail, SmtpTransport, Transport};
