//! In-memory repositories for development and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::NotificationResult;
use crate::models::{
    DeliveryStatus, DirectoryUser, HistoryRecord, NewQueueEntry, QueueEntry, TransportConfig,
};
use crate::repository::{
    ConfigRepository, HistoryRepository, LeaseRepository, QueueRepository, UserDirectory,
    lease_expiry,
};

#[derive(Debug, Default, Clone)]
pub struct InMemoryConfigRepository {
    snapshots: Arc<RwLock<Vec<TransportConfig>>>,
}

impl InMemoryConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot_count(&self) -> usize {
        self.snapshots.read().await.len()
    }
}

#[async_trait]
impl ConfigRepository for InMemoryConfigRepository {
    async fn latest(&self) -> NotificationResult<Option<TransportConfig>> {
        Ok(self.snapshots.read().await.last().cloned())
    }

    async fn insert(&self, config: TransportConfig) -> NotificationResult<()> {
        self.snapshots.write().await.push(config);
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryQueueRepository {
    entries: Arc<RwLock<HashMap<Uuid, QueueEntry>>>,
}

impl InMemoryQueueRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fully-formed entry, e.g. one with a back-dated `created_at`.
    pub async fn put(&self, entry: QueueEntry) {
        self.entries.write().await.insert(entry.id, entry);
    }

    pub async fn all(&self) -> Vec<QueueEntry> {
        let mut entries: Vec<QueueEntry> = self.entries.read().await.values().cloned().collect();
        sort_oldest_first(&mut entries);
        entries
    }

    async fn transition<F>(&self, id: Uuid, apply: F) -> bool
    where
        F: FnOnce(&mut QueueEntry) + Send,
    {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&id) {
            Some(entry) if entry.status == DeliveryStatus::Pending => {
                apply(entry);
                true
            }
            _ => false,
        }
    }
}

fn sort_oldest_first(entries: &mut [QueueEntry]) {
    entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl QueueRepository for InMemoryQueueRepository {
    async fn insert(&self, input: NewQueueEntry) -> NotificationResult<QueueEntry> {
        let entry = QueueEntry {
            id: Uuid::now_v7(),
            recipient_address: input.recipient_address,
            subject: input.subject,
            body: input.body,
            related_report_id: input.related_report_id,
            status: DeliveryStatus::Pending,
            created_at: Utc::now(),
            sent_at: None,
            retry_count: 0,
        };
        self.entries.write().await.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn get(&self, id: Uuid) -> NotificationResult<Option<QueueEntry>> {
        Ok(self.entries.read().await.get(&id).cloned())
    }

    async fn due_entries(
        &self,
        max_retries: u32,
        limit: u64,
    ) -> NotificationResult<Vec<QueueEntry>> {
        let mut due: Vec<QueueEntry> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.status == DeliveryStatus::Pending && e.retry_count < max_retries)
            .cloned()
            .collect();

        sort_oldest_first(&mut due);
        due.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(due)
    }

    async fn mark_sent(&self, id: Uuid) -> NotificationResult<bool> {
        Ok(self
            .transition(id, |entry| {
                entry.status = DeliveryStatus::Sent;
                entry.sent_at = Some(Utc::now());
            })
            .await)
    }

    async fn mark_failed_retry(&self, id: Uuid) -> NotificationResult<bool> {
        Ok(self
            .transition(id, |entry| entry.retry_count += 1)
            .await)
    }

    async fn mark_failed_terminal(&self, id: Uuid) -> NotificationResult<bool> {
        Ok(self
            .transition(id, |entry| {
                entry.retry_count += 1;
                entry.status = DeliveryStatus::Failed;
            })
            .await)
    }

    async fn count_by_status(&self) -> NotificationResult<Vec<(DeliveryStatus, u64)>> {
        let mut counts: HashMap<DeliveryStatus, u64> = HashMap::new();
        for entry in self.entries.read().await.values() {
            *counts.entry(entry.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn recent(&self, limit: u64) -> NotificationResult<Vec<QueueEntry>> {
        let mut entries = self.all().await;
        entries.reverse();
        entries.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(entries)
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryHistoryRepository {
    records: Arc<RwLock<Vec<HistoryRecord>>>,
}

impl InMemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<HistoryRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl HistoryRepository for InMemoryHistoryRepository {
    async fn append(&self, record: HistoryRecord) -> NotificationResult<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn for_entry(&self, queue_entry_id: Uuid) -> NotificationResult<Vec<HistoryRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.queue_entry_id == queue_entry_id)
            .cloned()
            .collect())
    }
}

/// Returns every stored user at the requested plant; eligibility is left to
/// the resolver.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<Vec<DirectoryUser>>>,
}

impl InMemoryUserDirectory {
    pub fn new(users: Vec<DirectoryUser>) -> Self {
        Self {
            users: Arc::new(RwLock::new(users)),
        }
    }

    pub async fn add(&self, user: DirectoryUser) {
        self.users.write().await.push(user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn candidates(&self, plant: Option<String>) -> NotificationResult<Vec<DirectoryUser>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .filter(|u| plant.as_ref().is_none_or(|p| &u.plant == p))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryLeaseRepository {
    lease: Arc<RwLock<Option<(String, DateTime<Utc>)>>>,
}

impl InMemoryLeaseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn holder(&self) -> Option<String> {
        self.lease.read().await.as_ref().map(|(h, _)| h.clone())
    }
}

#[async_trait]
impl LeaseRepository for InMemoryLeaseRepository {
    async fn try_acquire(&self, holder: &str, ttl: Duration) -> NotificationResult<bool> {
        let mut lease = self.lease.write().await;
        let free = match lease.as_ref() {
            None => true,
            Some((current, expires_at)) => current == holder || *expires_at < Utc::now(),
        };
        if free {
            *lease = Some((holder.to_string(), lease_expiry(ttl)));
        }
        Ok(free)
    }

    async fn renew(&self, holder: &str, ttl: Duration) -> NotificationResult<bool> {
        let mut lease = self.lease.write().await;
        match lease.as_mut() {
            Some((current, expires_at)) if current == holder => {
                *expires_at = lease_expiry(ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, holder: &str) -> NotificationResult<()> {
        let mut lease = self.lease.write().await;
        if lease.as_ref().is_some_and(|(current, _)| current == holder) {
            *lease = None;
        }
        Ok(())
    }
}
