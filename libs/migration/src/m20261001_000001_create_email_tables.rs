use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Append-only SMTP settings; the newest row is the active one
        manager
            .create_table(
                Table::create()
                    .table(EmailConfig::Table)
                    .if_not_exists()
                    .col(pk_uuid(EmailConfig::Id))
                    .col(string_len(EmailConfig::SmtpServer, 100))
                    .col(integer(EmailConfig::SmtpPort))
                    .col(string_len(EmailConfig::Username, 100))
                    .col(string_len_null(EmailConfig::Password, 255))
                    .col(string_len(EmailConfig::AuthType, 20).default("starttls"))
                    .col(boolean(EmailConfig::UseAuth).default(true))
                    .col(big_integer(EmailConfig::TimeoutSeconds).default(30))
                    .col(integer(EmailConfig::MaxRetries).default(3))
                    .col(
                        timestamp_with_time_zone(EmailConfig::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EmailQueue::Table)
                    .if_not_exists()
                    .col(pk_uuid(EmailQueue::Id))
                    .col(string_len(EmailQueue::ToAddress, 255))
                    .col(string_len(EmailQueue::Subject, 255))
                    .col(text(EmailQueue::Body))
                    .col(big_integer_null(EmailQueue::ReportId))
                    .col(string_len(EmailQueue::Status, 20).default("pending"))
                    .col(
                        timestamp_with_time_zone(EmailQueue::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone_null(EmailQueue::SentAt))
                    .col(integer(EmailQueue::RetryCount).default(0))
                    .to_owned(),
            )
            .await?;

        // One row per terminal transition; the unique index makes a second
        // history row for the same entry impossible.
        manager
            .create_table(
                Table::create()
                    .table(EmailHistory::Table)
                    .if_not_exists()
                    .col(pk_uuid(EmailHistory::Id))
                    .col(uuid_uniq(EmailHistory::QueueEntryId))
                    .col(string_len(EmailHistory::ToAddress, 255))
                    .col(string_len(EmailHistory::Subject, 255))
                    .col(big_integer_null(EmailHistory::ReportId))
                    .col(
                        timestamp_with_time_zone(EmailHistory::SentAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(string_len(EmailHistory::Status, 20))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_history_queue_entry")
                            .from(EmailHistory::Table, EmailHistory::QueueEntryId)
                            .to(EmailQueue::Table, EmailQueue::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_config_created_at")
                    .table(EmailConfig::Table)
                    .col(EmailConfig::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Serves the due-entries scan: status filter, oldest first
        manager
            .create_index(
                Index::create()
                    .name("idx_email_queue_status_created_at")
                    .table(EmailQueue::Table)
                    .col(EmailQueue::Status)
                    .col(EmailQueue::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_queue_report_id")
                    .table(EmailQueue::Table)
                    .col(EmailQueue::ReportId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_history_sent_at")
                    .table(EmailHistory::Table)
                    .col(EmailHistory::SentAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmailHistory::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(EmailQueue::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(EmailConfig::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum EmailConfig {
    Table,
    Id,
    SmtpServer,
    SmtpPort,
    Username,
    Password,
    AuthType,
    UseAuth,
    TimeoutSeconds,
    MaxRetries,
    CreatedAt,
}

#[derive(DeriveIden)]
enum EmailQueue {
    Table,
    Id,
    ToAddress,
    Subject,
    Body,
    ReportId,
    Status,
    CreatedAt,
    SentAt,
    RetryCount,
}

#[derive(DeriveIden)]
enum EmailHistory {
    Table,
    Id,
    QueueEntryId,
    ToAddress,
    Subject,
    ReportId,
    SentAt,
    Status,
}
