use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::{error, info, instrument};

use super::PostgresConfig;
use crate::common::{DatabaseError, DatabaseResult, RetryConfig, retry_with_backoff};

/// Open a pool with the given options, without retrying.
pub async fn connect(options: ConnectOptions) -> DatabaseResult<DatabaseConnection> {
    let db = Database::connect(options).await?;
    info!("Connected to PostgreSQL");
    Ok(db)
}

/// Open a pool, retrying with backoff while the server is unreachable.
///
/// `None` uses [`RetryConfig::default`].
#[instrument(skip_all)]
pub async fn connect_with_retry(
    config: PostgresConfig,
    retry: Option<RetryConfig>,
) -> DatabaseResult<DatabaseConnection> {
    let retry = retry.unwrap_or_default();
    let options = config.into_connect_options();

    retry_with_backoff("postgres_connect", &retry, || connect(options.clone()))
        .await
        .map_err(|(attempts, e)| DatabaseError::ConnectionFailed {
            attempts,
            reason: e.to_string(),
        })
}

/// Apply every pending migration of `M`.
#[instrument(skip(db))]
pub async fn run_migrations<M: MigratorTrait>(
    db: &DatabaseConnection,
    app_name: &str,
) -> DatabaseResult<()> {
    let pending = M::get_pending_migrations(db).await?.len();
    if pending == 0 {
        info!(app = app_name, "Database schema is up to date");
        return Ok(());
    }

    info!(app = app_name, pending, "Applying migrations");
    M::up(db, None).await.map_err(|e| {
        error!(app = app_name, error = %e, "Migration failed");
        DatabaseError::MigrationError(e.to_string())
    })?;
    info!(app = app_name, "Migrations applied");
    Ok(())
}

/// Round-trip a ping to the server.
pub async fn check_health(db: &DatabaseConnection) -> DatabaseResult<()> {
    db.ping()
        .await
        .map_err(|e| DatabaseError::HealthCheckFailed(e.to_string()))
}
