//! PostgreSQL connection management: pool settings, connect-time retry,
//! the migration runner and a liveness probe.

mod config;
mod connector;

pub use config::PostgresConfig;
pub use connector::{check_health, connect, connect_with_retry, run_migrations};

pub use sea_orm::{ConnectOptions, DatabaseConnection, DbErr};
pub use sea_orm_migration::MigratorTrait;
