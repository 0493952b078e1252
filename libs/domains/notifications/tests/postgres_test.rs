//! Repository and end-to-end tests against a real PostgreSQL
//!
//! Each test starts its own container with migrations applied. Run with
//! `cargo test -p domain_notifications -- --ignored` when Docker is available.

use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::ConnectionTrait;
use domain_notifications::*;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{TestDataBuilder, TestDatabase, TestUser};

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_config_latest_snapshot_wins() {
    let db = TestDatabase::new().await;
    let repo = PgConfigRepository::new(db.connection());

    assert!(repo.latest().await.unwrap().is_none());

    repo.insert(TransportConfig {
        server: "smtp.first.local".into(),
        ..TransportConfig::default()
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    repo.insert(TransportConfig {
        server: "smtp.second.local".into(),
        auth_secret: Some("pw".into()),
        auth_mode: AuthMode::None,
        ..TransportConfig::default()
    })
    .await
    .unwrap();

    let latest = repo.latest().await.unwrap().unwrap();
    assert_eq!(latest.server, "smtp.second.local");
    assert_eq!(latest.auth_mode, AuthMode::None);
    assert_eq!(latest.auth_secret.as_deref(), Some("pw"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_queue_transitions_are_conditional() {
    let db = TestDatabase::new().await;
    let repo = PgQueueRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("queue_transitions");

    let entry = repo
        .insert(
            NewQueueEntry::new(builder.address("sup"), "Subject", "<p>Body</p>")
                .for_report(builder.report_id()),
        )
        .await
        .unwrap();
    assert_eq!(entry.status, DeliveryStatus::Pending);
    assert_eq!(entry.retry_count, 0);

    assert!(repo.mark_failed_retry(entry.id).await.unwrap());
    assert!(repo.mark_sent(entry.id).await.unwrap());
    assert!(!repo.mark_sent(entry.id).await.unwrap());
    assert!(!repo.mark_failed_terminal(entry.id).await.unwrap());

    let stored = repo.get(entry.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DeliveryStatus::Sent);
    assert_eq!(stored.retry_count, 1);
    assert!(stored.sent_at.is_some());
    assert_eq!(stored.related_report_id, Some(builder.report_id()));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_due_entries_order_and_ceiling() {
    let db = TestDatabase::new().await;
    let repo = PgQueueRepository::new(db.connection());

    let first = repo
        .insert(NewQueueEntry::new("first@test.local", "s", "b"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = repo
        .insert(NewQueueEntry::new("second@test.local", "s", "b"))
        .await
        .unwrap();
    let exhausted = repo
        .insert(NewQueueEntry::new("exhausted@test.local", "s", "b"))
        .await
        .unwrap();
    for _ in 0..3 {
        repo.mark_failed_retry(exhausted.id).await.unwrap();
    }

    let due = repo.due_entries(3, 10).await.unwrap();
    let ids: Vec<_> = due.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);

    let counts = repo.count_by_status().await.unwrap();
    assert_eq!(counts, vec![(DeliveryStatus::Pending, 3)]);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_history_one_record_per_entry() {
    let db = TestDatabase::new().await;
    let queue = PgQueueRepository::new(db.connection());
    let history = PgHistoryRepository::new(db.connection());

    let entry = queue
        .insert(NewQueueEntry::new("sup@test.local", "s", "b"))
        .await
        .unwrap();

    history
        .append(HistoryRecord::for_entry(&entry, HistoryOutcome::Sent))
        .await
        .unwrap();
    let duplicate = history
        .append(HistoryRecord::for_entry(&entry, HistoryOutcome::Failed))
        .await;
    assert!(matches!(duplicate, Err(NotificationError::Database(_))));

    let records = history.for_entry(entry.id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, HistoryOutcome::Sent);

    let delete = db
        .connection()
        .execute_unprepared(&format!(
            "DELETE FROM email_queue WHERE id = '{}'",
            entry.id
        ))
        .await;
    assert!(delete.is_err());
    assert_eq!(history.for_entry(entry.id).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_user_directory_filters_and_orders() {
    let db = TestDatabase::new().await;
    db.create_user(&TestUser::supervisor("zed", "Young", "Dallas"))
        .await;
    db.create_user(&TestUser::supervisor("amy", "Adams", "Dallas"))
        .await;
    db.create_user(&TestUser::supervisor("boss", "Zimmer", "Dallas").admin())
        .await;
    db.create_user(&TestUser::supervisor("nopw", "Brown", "Dallas").without_password())
        .await;
    db.create_user(&TestUser::supervisor("op", "Clark", "Dallas").regular())
        .await;
    db.create_user(&TestUser::supervisor("tulsa", "Diaz", "Tulsa"))
        .await;

    let resolver = RecipientResolver::new(Arc::new(PgUserDirectory::new(db.connection())));

    let dallas: Vec<String> = resolver
        .resolve(Some("Dallas"))
        .await
        .into_iter()
        .map(|r| r.address)
        .collect();
    assert_eq!(
        dallas,
        vec!["boss@test.local", "amy@test.local", "zed@test.local"]
    );

    assert_eq!(resolver.resolve(None).await.len(), 4);
    assert!(resolver.resolve(Some("Nowhere")).await.is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_lease_exclusive_and_expiring() {
    let db = TestDatabase::new().await;
    let lease = PgLeaseRepository::new(db.connection());
    let ttl = Duration::from_secs(60);

    assert!(lease.try_acquire("a", ttl).await.unwrap());
    assert!(!lease.try_acquire("b", ttl).await.unwrap());
    assert!(lease.renew("a", ttl).await.unwrap());
    assert!(!lease.renew("b", ttl).await.unwrap());

    lease.release("a").await.unwrap();
    assert!(lease.try_acquire("b", Duration::ZERO).await.unwrap());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(lease.try_acquire("c", ttl).await.unwrap());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_end_to_end_retry_then_failed() {
    let db = TestDatabase::new().await;
    db.create_user(&TestUser::supervisor("sup", "Lopez", "Dallas"))
        .await;

    let repositories = Repositories::postgres(db.connection());
    let transport = MockSmtpTransport::failing("connection refused");
    let service = NotificationService::new(
        repositories.clone(),
        Arc::new(transport.clone()),
        ProcessorSettings::default(),
    )
    .unwrap();

    let payload = ReportPayload {
        report_id: Some(1001),
        plant: Some("Dallas".into()),
        updated_at: Some(Utc::now() - ChronoDuration::minutes(1)),
        ..ReportPayload::default()
    };
    let queued = service
        .notify_report(NotificationKind::HighPriority, &payload)
        .await;
    assert!(queued.all_queued());

    for _ in 0..3 {
        service.process_queue().await;
    }

    let status = service.queue_status(DEFAULT_RECENT_LIMIT).await.unwrap();
    assert_eq!(status.failed_count, 1);
    assert_eq!(status.pending_count, 0);
    assert_eq!(status.recent_entries[0].retry_count, 3);

    let entry_id = status.recent_entries[0].id;
    let history = repositories.history.for_entry(entry_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].outcome, HistoryOutcome::Failed);
    assert_eq!(history[0].related_report_id, Some(1001));

    assert_eq!(service.process_queue().await.attempted, 0);
    assert_eq!(transport.attempts(), 3);
}
