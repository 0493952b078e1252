/// Error type for connection-level database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Error reported by SeaORM / sqlx
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sea_orm::DbErr),

    /// Connection could not be established within the retry budget
    #[error("Connection failed after {attempts} attempts: {reason}")]
    ConnectionFailed { attempts: u32, reason: String },

    /// Liveness probe failed
    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    /// Migrations could not be applied
    #[error("Migration error: {0}")]
    MigrationError(String),
}

/// Result type alias for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;
