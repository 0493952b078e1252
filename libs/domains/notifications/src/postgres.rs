//! PostgreSQL repositories (SeaORM).

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    ExprTrait, QueryFilter, QueryOrder, QuerySelect, Statement,
};
use std::time::Duration;
use uuid::Uuid;

use crate::entity::{email_config, email_history, email_queue, processor_lease, users};
use crate::error::NotificationResult;
use crate::models::{
    DeliveryStatus, DirectoryUser, HistoryRecord, NewQueueEntry, QueueEntry, TransportConfig,
};
use crate::repository::{
    ConfigRepository, HistoryRepository, LeaseRepository, QueueRepository, UserDirectory,
    lease_expiry,
};

pub struct PgConfigRepository {
    db: DatabaseConnection,
}

impl PgConfigRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConfigRepository for PgConfigRepository {
    async fn latest(&self) -> NotificationResult<Option<TransportConfig>> {
        let model = email_config::Entity::find()
            .order_by_desc(email_config::Column::CreatedAt)
            .order_by_desc(email_config::Column::Id)
            .one(&self.db)
            .await?;

        Ok(model.map(Into::into))
    }

    async fn insert(&self, config: TransportConfig) -> NotificationResult<()> {
        let active_model: email_config::ActiveModel = config.into();
        email_config::Entity::insert(active_model)
            .exec(&self.db)
            .await?;

        tracing::info!("Stored new transport configuration snapshot");
        Ok(())
    }
}

pub struct PgQueueRepository {
    db: DatabaseConnection,
}

impl PgQueueRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn pending(id: Uuid) -> Condition {
        Condition::all()
            .add(email_queue::Column::Id.eq(id))
            .add(email_queue::Column::Status.eq(DeliveryStatus::Pending))
    }
}

#[async_trait]
impl QueueRepository for PgQueueRepository {
    async fn insert(&self, entry: NewQueueEntry) -> NotificationResult<QueueEntry> {
        let active_model: email_queue::ActiveModel = entry.into();
        let model = email_queue::Entity::insert(active_model)
            .exec_with_returning(&self.db)
            .await?;

        tracing::debug!(entry_id = %model.id, to = %model.to_address, "Queued email");
        Ok(model.into())
    }

    async fn get(&self, id: Uuid) -> NotificationResult<Option<QueueEntry>> {
        let model = email_queue::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn due_entries(
        &self,
        max_retries: u32,
        limit: u64,
    ) -> NotificationResult<Vec<QueueEntry>> {
        let ceiling = i32::try_from(max_retries).unwrap_or(i32::MAX);

        let models = email_queue::Entity::find()
            .filter(email_queue::Column::Status.eq(DeliveryStatus::Pending))
            .filter(email_queue::Column::RetryCount.lt(ceiling))
            .order_by_asc(email_queue::Column::CreatedAt)
            .order_by_asc(email_queue::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn mark_sent(&self, id: Uuid) -> NotificationResult<bool> {
        let result = email_queue::Entity::update_many()
            .set(email_queue::ActiveModel {
                status: Set(DeliveryStatus::Sent),
                sent_at: Set(Some(Utc::now().into())),
                ..Default::default()
            })
            .filter(Self::pending(id))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn mark_failed_retry(&self, id: Uuid) -> NotificationResult<bool> {
        let result = email_queue::Entity::update_many()
            .col_expr(
                email_queue::Column::RetryCount,
                Expr::col(email_queue::Column::RetryCount).add(1),
            )
            .filter(Self::pending(id))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn mark_failed_terminal(&self, id: Uuid) -> NotificationResult<bool> {
        let result = email_queue::Entity::update_many()
            .set(email_queue::ActiveModel {
                status: Set(DeliveryStatus::Failed),
                ..Default::default()
            })
            .col_expr(
                email_queue::Column::RetryCount,
                Expr::col(email_queue::Column::RetryCount).add(1),
            )
            .filter(Self::pending(id))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn count_by_status(&self) -> NotificationResult<Vec<(DeliveryStatus, u64)>> {
        let rows: Vec<(DeliveryStatus, i64)> = email_queue::Entity::find()
            .select_only()
            .column(email_queue::Column::Status)
            .column_as(email_queue::Column::Id.count(), "count")
            .group_by(email_queue::Column::Status)
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(status, count)| (status, u64::try_from(count).unwrap_or(0)))
            .collect())
    }

    async fn recent(&self, limit: u64) -> NotificationResult<Vec<QueueEntry>> {
        let models = email_queue::Entity::find()
            .order_by_desc(email_queue::Column::CreatedAt)
            .order_by_desc(email_queue::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }
}

pub struct PgHistoryRepository {
    db: DatabaseConnection,
}

impl PgHistoryRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HistoryRepository for PgHistoryRepository {
    async fn append(&self, record: HistoryRecord) -> NotificationResult<()> {
        let active_model: email_history::ActiveModel = record.into();
        email_history::Entity::insert(active_model)
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn for_entry(&self, queue_entry_id: Uuid) -> NotificationResult<Vec<HistoryRecord>> {
        let models = email_history::Entity::find()
            .filter(email_history::Column::QueueEntryId.eq(queue_entry_id))
            .order_by_asc(email_history::Column::SentAt)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }
}

pub struct PgUserDirectory {
    db: DatabaseConnection,
}

impl PgUserDirectory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn candidates(&self, plant: Option<String>) -> NotificationResult<Vec<DirectoryUser>> {
        let mut query = users::Entity::find()
            .filter(
                Condition::any()
                    .add(users::Column::IsSupervisor.eq(true))
                    .add(users::Column::IsAdmin.eq(true)),
            )
            .filter(users::Column::PasswordHash.is_not_null());

        if let Some(plant) = plant {
            query = query.filter(users::Column::Plant.eq(plant));
        }

        let models = query
            .order_by_desc(users::Column::IsAdmin)
            .order_by_asc(users::Column::LastName)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }
}

pub struct PgLeaseRepository {
    db: DatabaseConnection,
}

impl PgLeaseRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LeaseRepository for PgLeaseRepository {
    async fn try_acquire(&self, holder: &str, ttl: Duration) -> NotificationResult<bool> {
        let now = Utc::now();
        let expires_at = lease_expiry(ttl);

        let sql = r#"
            UPDATE email_processor_lease
            SET holder = $1, expires_at = $2
            WHERE name = $3
              AND (holder IS NULL OR holder = $1 OR expires_at IS NULL OR expires_at < $4)
        "#;
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [
                holder.into(),
                expires_at.into(),
                processor_lease::QUEUE_LEASE.into(),
                now.into(),
            ],
        );
        if self.db.execute_raw(stmt).await?.rows_affected() == 1 {
            return Ok(true);
        }

        // Missing row (schema created by hand): claim it by inserting.
        let sql = r#"
            INSERT INTO email_processor_lease (name, holder, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
        "#;
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [
                processor_lease::QUEUE_LEASE.into(),
                holder.into(),
                expires_at.into(),
            ],
        );
        Ok(self.db.execute_raw(stmt).await?.rows_affected() == 1)
    }

    async fn renew(&self, holder: &str, ttl: Duration) -> NotificationResult<bool> {
        let result = processor_lease::Entity::update_many()
            .set(processor_lease::ActiveModel {
                expires_at: Set(Some(lease_expiry(ttl).into())),
                ..Default::default()
            })
            .filter(processor_lease::Column::Name.eq(processor_lease::QUEUE_LEASE))
            .filter(processor_lease::Column::Holder.eq(holder))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn release(&self, holder: &str) -> NotificationResult<()> {
        processor_lease::Entity::update_many()
            .set(processor_lease::ActiveModel {
                holder: Set(None),
                expires_at: Set(None),
                ..Default::default()
            })
            .filter(processor_lease::Column::Name.eq(processor_lease::QUEUE_LEASE))
            .filter(processor_lease::Column::Holder.eq(holder))
            .exec(&self.db)
            .await?;

        Ok(())
    }
}
