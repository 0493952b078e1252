//! Batch delivery of queued email.
//!
//! Each entry moves through a small state machine:
//!
//! ```text
//! Pending --send ok------------------------------> Sent    (+ history)
//! Pending --send failed, retry_count+1 <  max----> Pending (retry_count+1)
//! Pending --send failed, retry_count+1 >= max----> Failed  (+ history)
//! ```
//!
//! A batch runs under two guards: an in-process mutex and a lease row shared
//! by every processor pointed at the same database. Whoever loses either race
//! returns [`BatchOutcome::skipped`] without touching the queue.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config_store::ConfigStore;
use crate::error::NotificationResult;
use crate::models::{BatchOutcome, HistoryOutcome, HistoryRecord, QueueEntry, TransportConfig};
use crate::repository::{HistoryRepository, LeaseRepository, QueueRepository};
use crate::transport::Transport;

/// Entries fetched per batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: u64 = 100;

/// Slack added to the lease on top of one bounded send.
const LEASE_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub batch_size: u64,
    /// Identifies this process in the lease row.
    pub holder_id: String,
}

impl ProcessorSettings {
    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_holder_id(mut self, holder_id: impl Into<String>) -> Self {
        self.holder_id = holder_id.into();
        self
    }
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            holder_id: format!("processor-{}", Uuid::now_v7()),
        }
    }
}

/// What happened to a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryResult {
    Sent,
    Retried,
    Failed,
    /// Someone else already moved the entry out of `Pending`.
    Stale,
}

pub struct QueueProcessor {
    config: ConfigStore,
    queue: Arc<dyn QueueRepository>,
    history: Arc<dyn HistoryRepository>,
    lease: Arc<dyn LeaseRepository>,
    transport: Arc<dyn Transport>,
    settings: ProcessorSettings,
    in_flight: Mutex<()>,
}

impl QueueProcessor {
    pub fn new(
        config: ConfigStore,
        queue: Arc<dyn QueueRepository>,
        history: Arc<dyn HistoryRepository>,
        lease: Arc<dyn LeaseRepository>,
        transport: Arc<dyn Transport>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            config,
            queue,
            history,
            lease,
            transport,
            settings,
            in_flight: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    /// Run one batch over the due entries.
    ///
    /// Never fails. Transport and persistence problems are logged and
    /// tallied in the returned [`BatchOutcome`]; a problem with one entry
    /// does not stop the others.
    #[instrument(skip(self), fields(holder = %self.settings.holder_id, transport = self.transport.name()))]
    pub async fn process_queue(&self) -> BatchOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            info!("Queue batch already running in this process, skipping");
            return BatchOutcome::skipped();
        };

        let config = self.config.load().await;
        let ttl = lease_ttl(&config);
        let holder = self.settings.holder_id.as_str();

        match self.lease.try_acquire(holder, ttl).await {
            Ok(true) => {}
            Ok(false) => {
                info!("Queue lease held by another processor, skipping");
                return BatchOutcome::skipped();
            }
            Err(e) => {
                error!(error = %e, "Failed to acquire queue lease, skipping");
                return BatchOutcome {
                    errors: 1,
                    ..BatchOutcome::skipped()
                };
            }
        }

        let outcome = self.drain(&config, ttl).await;

        if let Err(e) = self.lease.release(holder).await {
            warn!(error = %e, "Failed to release queue lease; it will expire on its own");
        }

        info!(
            attempted = outcome.attempted,
            sent = outcome.sent_count,
            retried = outcome.retried,
            failed = outcome.failed,
            errors = outcome.errors,
            "Queue batch finished"
        );

        outcome
    }

    async fn drain(&self, config: &TransportConfig, ttl: Duration) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        if config.max_retries == 0 {
            warn!("max_retries is 0, no queue entry is eligible for delivery");
        }

        let entries = match self
            .queue
            .due_entries(config.max_retries, self.settings.batch_size)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "Failed to fetch due emails");
                outcome.errors += 1;
                return outcome;
            }
        };

        if entries.is_empty() {
            debug!("No emails due");
            return outcome;
        }

        debug!(count = entries.len(), "Processing due emails");

        for entry in &entries {
            outcome.attempted += 1;

            match self.process_entry(config, entry).await {
                Ok(EntryResult::Sent) => outcome.sent_count += 1,
                Ok(EntryResult::Retried) => outcome.retried += 1,
                Ok(EntryResult::Failed) => outcome.failed += 1,
                Ok(EntryResult::Stale) => {
                    debug!(entry_id = %entry.id, "Entry changed concurrently, left as is");
                }
                Err(e) => {
                    error!(entry_id = %entry.id, error = %e, "Failed to record delivery result");
                    outcome.errors += 1;
                }
            }

            match self.lease.renew(&self.settings.holder_id, ttl).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!("Queue lease lost, stopping batch early");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to renew queue lease, stopping batch early");
                    break;
                }
            }
        }

        outcome
    }

    async fn process_entry(
        &self,
        config: &TransportConfig,
        entry: &QueueEntry,
    ) -> NotificationResult<EntryResult> {
        let sent = self
            .transport
            .send(config, &entry.recipient_address, &entry.subject, &entry.body)
            .await;

        match sent {
            Ok(receipt) => {
                if !self.queue.mark_sent(entry.id).await? {
                    return Ok(EntryResult::Stale);
                }
                self.history
                    .append(HistoryRecord::for_entry(entry, HistoryOutcome::Sent))
                    .await?;

                info!(
                    entry_id = %entry.id,
                    to = %entry.recipient_address,
                    message_id = ?receipt.message_id,
                    "Email sent"
                );
                Ok(EntryResult::Sent)
            }
            Err(send_error) => {
                let attempts = entry.retry_count.saturating_add(1);

                if attempts >= config.max_retries {
                    if !self.queue.mark_failed_terminal(entry.id).await? {
                        return Ok(EntryResult::Stale);
                    }
                    self.history
                        .append(HistoryRecord::for_entry(entry, HistoryOutcome::Failed))
                        .await?;

                    error!(
                        entry_id = %entry.id,
                        to = %entry.recipient_address,
                        attempts,
                        error = %send_error,
                        "Email permanently failed"
                    );
                    Ok(EntryResult::Failed)
                } else {
                    if !self.queue.mark_failed_retry(entry.id).await? {
                        return Ok(EntryResult::Stale);
                    }

                    warn!(
                        entry_id = %entry.id,
                        to = %entry.recipient_address,
                        attempts,
                        max_retries = config.max_retries,
                        error = %send_error,
                        "Email send failed, will retry"
                    );
                    Ok(EntryResult::Retried)
                }
            }
        }
    }
}

/// Long enough to cover one bounded send plus the bookkeeping around it.
/// The lease is renewed after every entry.
fn lease_ttl(config: &TransportConfig) -> Duration {
    config
        .timeout()
        .saturating_mul(2)
        .saturating_add(LEASE_GRACE)
}
