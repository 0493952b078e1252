//! Entry points used by the reporting application, the admin API and the
//! processor binary.

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::config_store::ConfigStore;
use crate::error::{NotificationError, NotificationResult};
use crate::memory::{
    InMemoryConfigRepository, InMemoryHistoryRepository, InMemoryLeaseRepository,
    InMemoryQueueRepository, InMemoryUserDirectory,
};
use crate::models::{
    BatchOutcome, NewQueueEntry, NotificationKind, NotifyOutcome, QueueStatus, ReportPayload,
    TransportConfig, TransportConfigView,
};
use crate::postgres::{
    PgConfigRepository, PgHistoryRepository, PgLeaseRepository, PgQueueRepository,
    PgUserDirectory,
};
use crate::processor::{ProcessorSettings, QueueProcessor};
use crate::queue::DeliveryQueue;
use crate::recipients::RecipientResolver;
use crate::repository::{
    ConfigRepository, HistoryRepository, LeaseRepository, QueueRepository, UserDirectory,
};
use crate::templates::MessageComposer;
use crate::transport::Transport;

/// Storage handles the service is built from.
#[derive(Clone)]
pub struct Repositories {
    pub config: Arc<dyn ConfigRepository>,
    pub queue: Arc<dyn QueueRepository>,
    pub history: Arc<dyn HistoryRepository>,
    pub users: Arc<dyn UserDirectory>,
    pub lease: Arc<dyn LeaseRepository>,
}

impl Repositories {
    pub fn postgres(db: DatabaseConnection) -> Self {
        Self {
            config: Arc::new(PgConfigRepository::new(db.clone())),
            queue: Arc::new(PgQueueRepository::new(db.clone())),
            history: Arc::new(PgHistoryRepository::new(db.clone())),
            users: Arc::new(PgUserDirectory::new(db.clone())),
            lease: Arc::new(PgLeaseRepository::new(db)),
        }
    }

    /// Process-local storage; nothing survives a restart.
    pub fn in_memory(directory: InMemoryUserDirectory) -> Self {
        Self {
            config: Arc::new(InMemoryConfigRepository::new()),
            queue: Arc::new(InMemoryQueueRepository::new()),
            history: Arc::new(InMemoryHistoryRepository::new()),
            users: Arc::new(directory),
            lease: Arc::new(InMemoryLeaseRepository::new()),
        }
    }
}

pub struct NotificationService {
    config: ConfigStore,
    queue: DeliveryQueue,
    resolver: RecipientResolver,
    composer: MessageComposer,
    processor: QueueProcessor,
    transport: Arc<dyn Transport>,
}

impl NotificationService {
    pub fn new(
        repositories: Repositories,
        transport: Arc<dyn Transport>,
        settings: ProcessorSettings,
    ) -> NotificationResult<Self> {
        let config = ConfigStore::new(repositories.config);
        let processor = QueueProcessor::new(
            config.clone(),
            repositories.queue.clone(),
            repositories.history,
            repositories.lease,
            transport.clone(),
            settings,
        );

        Ok(Self {
            config,
            queue: DeliveryQueue::new(repositories.queue),
            resolver: RecipientResolver::new(repositories.users),
            composer: MessageComposer::new()?,
            processor,
            transport,
        })
    }

    /// Fan a report notification out to every eligible recipient at the
    /// report's plant.
    ///
    /// Call only after the report itself is committed. Nothing here fails
    /// the caller: an empty recipient list, a rendering problem or a queue
    /// write error is logged and reflected in the returned counts.
    #[instrument(skip(self, payload), fields(report_id = ?payload.report_id, plant = ?payload.plant))]
    pub async fn notify_report(
        &self,
        kind: NotificationKind,
        payload: &ReportPayload,
    ) -> NotifyOutcome {
        let recipients = self.resolver.resolve(payload.plant.as_deref()).await;
        let mut outcome = NotifyOutcome {
            recipients: recipients.len(),
            ..NotifyOutcome::default()
        };

        if recipients.is_empty() {
            warn!("No recipients found for report notification");
            return outcome;
        }

        let message = match self.composer.compose(kind, payload) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "Failed to compose report notification");
                outcome.failed = recipients.len();
                return outcome;
            }
        };

        for recipient in &recipients {
            let mut entry =
                NewQueueEntry::new(&recipient.address, &message.subject, &message.html_body);
            if let Some(report_id) = payload.report_id {
                entry = entry.for_report(report_id);
            }

            if self.queue.enqueue(entry).await {
                outcome.queued += 1;
            } else {
                outcome.failed += 1;
            }
        }

        info!(
            recipients = outcome.recipients,
            queued = outcome.queued,
            failed = outcome.failed,
            "Report notification queued"
        );
        outcome
    }

    /// Queue an ad-hoc message.
    pub async fn enqueue(&self, entry: NewQueueEntry) -> bool {
        self.queue.enqueue(entry).await
    }

    pub async fn process_queue(&self) -> BatchOutcome {
        self.processor.process_queue().await
    }

    pub async fn queue_status(&self, recent_limit: u64) -> NotificationResult<QueueStatus> {
        self.queue.status(recent_limit).await
    }

    pub async fn load_config(&self) -> TransportConfig {
        self.config.load().await
    }

    pub async fn config_view(&self) -> TransportConfigView {
        self.config.load().await.view()
    }

    /// Store a new configuration snapshot.
    ///
    /// An absent `auth_secret` keeps the stored secret; an empty one clears it.
    #[instrument(skip_all, fields(server = %config.server, port = config.port))]
    pub async fn update_config(
        &self,
        mut config: TransportConfig,
    ) -> NotificationResult<TransportConfigView> {
        config.validate()?;

        match config.auth_secret.as_deref() {
            None => config.auth_secret = self.config.load().await.auth_secret,
            Some("") => config.auth_secret = None,
            Some(_) => {}
        }

        let view = config.view();
        if !self.config.save(config).await {
            return Err(NotificationError::Internal(
                "transport configuration could not be stored".to_string(),
            ));
        }

        info!("Transport configuration updated");
        Ok(view)
    }

    /// Probe the configured SMTP server without logging in or sending.
    #[instrument(skip(self), fields(transport = self.transport.name()))]
    pub async fn test_connection(&self) -> bool {
        let config = self.config.load().await;
        match self.transport.test_connection(&config).await {
            Ok(()) => {
                info!(server = %config.server, port = config.port, "SMTP server reachable");
                true
            }
            Err(e) => {
                warn!(server = %config.server, port = config.port, error = %e, "SMTP connection test failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeliveryStatus, DirectoryUser};
    use crate::repository::MockQueueRepository;
    use crate::transport::MockSmtpTransport;

    fn supervisor(last: &str, plant: &str) -> DirectoryUser {
        DirectoryUser {
            first_name: "Sam".into(),
            last_name: last.into(),
            email: format!("{}@plant.local", last.to_lowercase()),
            plant: plant.into(),
            is_admin: false,
            is_supervisor: true,
            has_credentials: true,
        }
    }

    fn payload(plant: &str) -> ReportPayload {
        ReportPayload {
            report_id: Some(42),
            plant: Some(plant.into()),
            employee_name: Some("Jane Doe".into()),
            description: Some("Forklift clipped a rack".into()),
            ..ReportPayload::default()
        }
    }

    fn service_with(
        directory: InMemoryUserDirectory,
        transport: MockSmtpTransport,
    ) -> (NotificationService, Repositories) {
        let repositories = Repositories::in_memory(directory);
        let service = NotificationService::new(
            repositories.clone(),
            Arc::new(transport),
            ProcessorSettings::default(),
        )
        .unwrap();
        (service, repositories)
    }

    #[tokio::test]
    async fn test_notify_report_queues_one_entry_per_recipient() {
        let directory = InMemoryUserDirectory::new(vec![
            supervisor("Alvarez", "Dallas"),
            supervisor("Brooks", "Dallas"),
            supervisor("Chen", "Tulsa"),
        ]);
        let (service, repositories) = service_with(directory, MockSmtpTransport::new());

        let outcome = service
            .notify_report(NotificationKind::NewReport, &payload("Dallas"))
            .await;

        assert_eq!(
            outcome,
            NotifyOutcome {
                recipients: 2,
                queued: 2,
                failed: 0
            }
        );
        assert!(outcome.all_queued());

        let recent = repositories.queue.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        for entry in &recent {
            assert_eq!(entry.status, DeliveryStatus::Pending);
            assert_eq!(entry.retry_count, 0);
            assert_eq!(entry.related_report_id, Some(42));
            assert_eq!(entry.subject, "New Near Miss Report - Dallas Plant");
        }
    }

    #[tokio::test]
    async fn test_notify_report_without_recipients_queues_nothing() {
        let (service, repositories) =
            service_with(InMemoryUserDirectory::default(), MockSmtpTransport::new());

        let outcome = service
            .notify_report(NotificationKind::HighPriority, &payload("Dallas"))
            .await;

        assert_eq!(outcome, NotifyOutcome::default());
        assert!(!outcome.all_queued());
        assert!(repositories.queue.recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_notify_report_counts_queue_failures() {
        let mut queue = MockQueueRepository::new();
        queue
            .expect_insert()
            .returning(|_| Err(NotificationError::Database("disk full".into())));

        let repositories = Repositories {
            queue: Arc::new(queue),
            ..Repositories::in_memory(InMemoryUserDirectory::new(vec![supervisor(
                "Alvarez", "Dallas",
            )]))
        };
        let service = NotificationService::new(
            repositories,
            Arc::new(MockSmtpTransport::new()),
            ProcessorSettings::default(),
        )
        .unwrap();

        let outcome = service
            .notify_report(NotificationKind::Update, &payload("Dallas"))
            .await;

        assert_eq!(outcome.recipients, 1);
        assert_eq!(outcome.queued, 0);
        assert_eq!(outcome.failed, 1);
    }

    #[tokio::test]
    async fn test_queued_notification_is_delivered() {
        let transport = MockSmtpTransport::new();
        let (service, _) = service_with(
            InMemoryUserDirectory::new(vec![supervisor("Alvarez", "Dallas")]),
            transport.clone(),
        );

        service
            .notify_report(NotificationKind::NewReport, &payload("Dallas"))
            .await;
        let outcome = service.process_queue().await;

        assert_eq!(outcome.sent_count, 1);
        assert!(transport.was_sent_to("alvarez@plant.local").await);

        let status = service.queue_status(20).await.unwrap();
        assert_eq!(status.sent_count, 1);
        assert_eq!(status.pending_count, 0);
    }

    #[tokio::test]
    async fn test_update_config_keeps_secret_when_omitted() {
        let (service, _) =
            service_with(InMemoryUserDirectory::default(), MockSmtpTransport::new());

        service
            .update_config(TransportConfig {
                auth_secret: Some("hunter2".into()),
                ..TransportConfig::default()
            })
            .await
            .unwrap();

        let view = service
            .update_config(TransportConfig {
                server: "smtp.plant.local".into(),
                auth_secret: None,
                ..TransportConfig::default()
            })
            .await
            .unwrap();

        assert!(view.has_secret);
        let stored = service.load_config().await;
        assert_eq!(stored.server, "smtp.plant.local");
        assert_eq!(stored.auth_secret.as_deref(), Some("hunter2"));

        let view = service
            .update_config(TransportConfig {
                auth_secret: Some(String::new()),
                ..TransportConfig::default()
            })
            .await
            .unwrap();
        assert!(!view.has_secret);
        assert!(service.load_config().await.auth_secret.is_none());
    }

    #[tokio::test]
    async fn test_update_config_rejects_invalid() {
        let (service, _) =
            service_with(InMemoryUserDirectory::default(), MockSmtpTransport::new());

        let err = service
            .update_config(TransportConfig {
                server: "  ".into(),
                ..TransportConfig::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, NotificationError::Validation(_)));
        assert_eq!(service.load_config().await, TransportConfig::default());
    }

    #[tokio::test]
    async fn test_connection_reports_bool() {
        let (reachable, _) =
            service_with(InMemoryUserDirectory::default(), MockSmtpTransport::new());
        assert!(reachable.test_connection().await);

        let (unreachable, _) = service_with(
            InMemoryUserDirectory::default(),
            MockSmtpTransport::new().with_reachable(false),
        );
        assert!(!unreachable.test_connection().await);
    }
}
