use crate::models::{DeliveryStatus, NewQueueEntry, QueueEntry};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "email_queue")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub to_address: String,
    pub subject: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub report_id: Option<i64>,
    pub status: DeliveryStatus,
    pub created_at: DateTimeWithTimeZone,
    pub sent_at: Option<DateTimeWithTimeZone>,
    pub retry_count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::email_history::Entity")]
    History,
}

impl Related<super::email_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::History.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for QueueEntry {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            recipient_address: model.to_address,
            subject: model.subject,
            body: model.body,
            related_report_id: model.report_id,
            status: model.status,
            created_at: model.created_at.into(),
            sent_at: model.sent_at.map(Into::into),
            retry_count: u32::try_from(model.retry_count).unwrap_or(0),
        }
    }
}

impl From<NewQueueEntry> for ActiveModel {
    fn from(input: NewQueueEntry) -> Self {
        ActiveModel {
            id: Set(Uuid::now_v7()),
            to_address: Set(input.recipient_address),
            subject: Set(input.subject),
            body: Set(input.body),
            report_id: Set(input.related_report_id),
            status: Set(DeliveryStatus::Pending),
            created_at: Set(chrono::Utc::now().into()),
            sent_at: Set(None),
            retry_count: Set(0),
        }
    }
}
