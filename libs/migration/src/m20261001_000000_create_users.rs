use sea_orm_migration::{prelude::*, schema::*};

/// The reporting application owns `users`; this only creates it when the
/// notification processor runs against an empty database.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::UserId))
                    .col(string_len(Users::FirstName, 50))
                    .col(string_len(Users::LastName, 50))
                    .col(string_len_uniq(Users::Username, 50))
                    .col(string_len(Users::Email, 100))
                    .col(string_len(Users::Plant, 20))
                    .col(boolean(Users::IsAdmin).default(false))
                    .col(boolean(Users::IsSupervisor).default(false))
                    .col(string_len_null(Users::PasswordHash, 255))
                    .col(
                        timestamp_with_time_zone(Users::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_users_plant")
                    .table(Users::Table)
                    .col(Users::Plant)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        // Shared with the reporting application, never dropped from here.
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    UserId,
    FirstName,
    LastName,
    Username,
    Email,
    Plant,
    IsAdmin,
    IsSupervisor,
    PasswordHash,
    CreatedAt,
}
