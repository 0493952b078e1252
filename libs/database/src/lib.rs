//! Database plumbing for the notification processor.
//!
//! Only PostgreSQL (via SeaORM) is supported. The crate owns connection pool
//! settings, connect-time retry, the liveness probe and the migration runner;
//! repositories live in the domain crates.
//!
//! ```ignore
//! use core_config::FromEnv;
//! use database::postgres::{PostgresConfig, connect_with_retry, run_migrations};
//!
//! let config = PostgresConfig::from_env()?;
//! let db = connect_with_retry(config, None).await?;
//! run_migrations::<migration::Migrator>(&db, "email-processor").await?;
//! ```

pub mod common;
pub mod postgres;

pub use common::{DatabaseError, DatabaseResult, RetryConfig};
