//! Producer-side access to the delivery queue.

use std::sync::Arc;
use tracing::{debug, error, instrument};

use crate::error::NotificationResult;
use crate::models::{DeliveryStatus, NewQueueEntry, QueueStatus};
use crate::repository::QueueRepository;

/// Newest entries included in [`QueueStatus`] by default.
pub const DEFAULT_RECENT_LIMIT: u64 = 20;

#[derive(Clone)]
pub struct DeliveryQueue {
    repository: Arc<dyn QueueRepository>,
}

impl DeliveryQueue {
    pub fn new(repository: Arc<dyn QueueRepository>) -> Self {
        Self { repository }
    }

    /// Add one pending entry. Failures are logged and reported as `false`;
    /// they never propagate to the caller that produced the notification.
    #[instrument(skip_all, fields(to = %entry.recipient_address, report_id = ?entry.related_report_id))]
    pub async fn enqueue(&self, entry: NewQueueEntry) -> bool {
        match self.repository.insert(entry).await {
            Ok(stored) => {
                debug!(entry_id = %stored.id, "Email queued");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to queue email");
                false
            }
        }
    }

    pub async fn status(&self, recent_limit: u64) -> NotificationResult<QueueStatus> {
        let mut status = QueueStatus::default();
        for (state, count) in self.repository.count_by_status().await? {
            match state {
                DeliveryStatus::Pending => status.pending_count = count,
                DeliveryStatus::Sent => status.sent_count = count,
                DeliveryStatus::Failed => status.failed_count = count,
            }
        }

        status.recent_entries = self
            .repository
            .recent(recent_limit)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();

        Ok(status)
    }
}
