use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EmailProcessorLease::Table)
                    .if_not_exists()
                    .col(string_len(EmailProcessorLease::Name, 64).primary_key())
                    .col(string_len_null(EmailProcessorLease::Holder, 128))
                    .col(timestamp_with_time_zone_null(EmailProcessorLease::ExpiresAt))
                    .to_owned(),
            )
            .await?;

        // Seed the lease row; the processor's upsert also recreates it if missing
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                INSERT INTO email_processor_lease (name, holder, expires_at)
                VALUES ('email_queue', NULL, NULL)
                ON CONFLICT (name) DO NOTHING
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmailProcessorLease::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum EmailProcessorLease {
    Table,
    Name,
    Holder,
    ExpiresAt,
}
