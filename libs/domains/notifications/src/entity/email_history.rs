use crate::models::{HistoryOutcome, HistoryRecord};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "email_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub queue_entry_id: Uuid,
    pub to_address: String,
    pub subject: String,
    pub report_id: Option<i64>,
    pub sent_at: DateTimeWithTimeZone,
    pub status: HistoryOutcome,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::email_queue::Entity",
        from = "Column::QueueEntryId",
        to = "super::email_queue::Column::Id",
        on_delete = "Restrict"
    )]
    QueueEntry,
}

impl Related<super::email_queue::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QueueEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for HistoryRecord {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            queue_entry_id: model.queue_entry_id,
            recipient_address: model.to_address,
            subject: model.subject,
            related_report_id: model.report_id,
            sent_at: model.sent_at.into(),
            outcome: model.status,
        }
    }
}

impl From<HistoryRecord> for ActiveModel {
    fn from(record: HistoryRecord) -> Self {
        ActiveModel {
            id: Set(record.id),
            queue_entry_id: Set(record.queue_entry_id),
            to_address: Set(record.recipient_address),
            subject: Set(record.subject),
            report_id: Set(record.related_report_id),
            sent_at: Set(record.sent_at.into()),
            status: Set(record.outcome),
        }
    }
}
