use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::error::NotificationResult;
use crate::models::{
    DeliveryStatus, DirectoryUser, HistoryRecord, NewQueueEntry, QueueEntry, TransportConfig,
};

/// Storage for transport configuration snapshots.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// Most recently created snapshot, if any
    async fn latest(&self) -> NotificationResult<Option<TransportConfig>>;

    /// Append a new snapshot
    async fn insert(&self, config: TransportConfig) -> NotificationResult<()>;
}

/// Storage for delivery queue entries.
///
/// The `mark_*` methods are conditional on the entry still being `Pending`
/// and return whether the row changed, so a transition is applied at most
/// once even if two processors race.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueRepository: Send + Sync {
    async fn insert(&self, entry: NewQueueEntry) -> NotificationResult<QueueEntry>;

    async fn get(&self, id: Uuid) -> NotificationResult<Option<QueueEntry>>;

    /// Pending entries with `retry_count < max_retries`, oldest first
    async fn due_entries(&self, max_retries: u32, limit: u64)
    -> NotificationResult<Vec<QueueEntry>>;

    /// Pending -> Sent, stamping `sent_at`
    async fn mark_sent(&self, id: Uuid) -> NotificationResult<bool>;

    /// Pending -> Pending with `retry_count + 1`
    async fn mark_failed_retry(&self, id: Uuid) -> NotificationResult<bool>;

    /// Pending -> Failed with `retry_count + 1`
    async fn mark_failed_terminal(&self, id: Uuid) -> NotificationResult<bool>;

    async fn count_by_status(&self) -> NotificationResult<Vec<(DeliveryStatus, u64)>>;

    /// Newest entries first
    async fn recent(&self, limit: u64) -> NotificationResult<Vec<QueueEntry>>;
}

/// Append-only audit trail of terminal transitions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn append(&self, record: HistoryRecord) -> NotificationResult<()>;

    async fn for_entry(&self, queue_entry_id: Uuid) -> NotificationResult<Vec<HistoryRecord>>;
}

/// Read access to the reporting application's users.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Users who may receive notifications, optionally limited to one plant.
    ///
    /// Implementations may pre-filter and pre-sort; the resolver applies the
    /// eligibility rule and ordering again.
    async fn candidates(&self, plant: Option<String>) -> NotificationResult<Vec<DirectoryUser>>;
}

/// Cross-process single-flight lease for the queue processor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LeaseRepository: Send + Sync {
    /// Take the lease if it is free, expired, or already ours.
    async fn try_acquire(&self, holder: &str, ttl: Duration) -> NotificationResult<bool>;

    /// Push the expiry out. False if the lease is no longer ours.
    async fn renew(&self, holder: &str, ttl: Duration) -> NotificationResult<bool>;

    async fn release(&self, holder: &str) -> NotificationResult<()>;
}

/// Expiry instant for a lease taken now with `ttl`.
pub(crate) fn lease_expiry(ttl: Duration) -> chrono::DateTime<chrono::Utc> {
    let now = chrono::Utc::now();
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_expiry_saturates() {
        let expiry = lease_expiry(Duration::from_secs(u64::MAX));
        assert_eq!(expiry, chrono::DateTime::<chrono::Utc>::MAX_UTC);

        let soon = lease_expiry(Duration::from_secs(60));
        assert!(soon > chrono::Utc::now());
    }
}
