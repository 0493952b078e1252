//! Process configuration for the email processor.
//!
//! SMTP settings are not here: they live in the database and are managed
//! through the admin API.

use core_config::server::ServerConfig;
use core_config::{ConfigError, Environment, FromEnv, env_parse};
use database::postgres::PostgresConfig;
use domain_notifications::{DEFAULT_BATCH_SIZE, ProcessorSettings};
use std::time::Duration;
use strum::{Display, EnumString};

/// Seconds between daemon batches when no cron expression is given.
pub const DEFAULT_PROCESS_INTERVAL_SECS: u64 = 300;

/// Width of the lease holder column.
pub const MAX_PROCESSOR_ID_LEN: usize = 128;

/// Which transport delivers queued mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TransportKind {
    #[default]
    Smtp,
    /// Records messages in memory instead of sending them
    Mock,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: PostgresConfig,
    pub admin: ServerConfig,
    pub process_interval: Duration,
    pub batch_size: u64,
    pub processor_id: Option<String>,
    pub transport: TransportKind,
}

impl AppConfig {
    pub fn processor_settings(&self) -> ProcessorSettings {
        let settings = ProcessorSettings::default().with_batch_size(self.batch_size);
        match &self.processor_id {
            Some(id) => settings.with_holder_id(id.clone()),
            None => settings,
        }
    }
}

impl FromEnv for AppConfig {
    /// Reads from environment variables:
    /// - DATABASE_URL (required) and the DB_* pool settings
    /// - APP_ENV
    /// - ADMIN_HOST / ADMIN_PORT
    /// - EMAIL_PROCESS_INTERVAL_SECS: defaults to 300
    /// - EMAIL_BATCH_SIZE: defaults to 100
    /// - EMAIL_PROCESSOR_ID: defaults to `processor-<uuid>`
    /// - EMAIL_TRANSPORT: `smtp` (default) or `mock`
    fn from_env() -> Result<Self, ConfigError> {
        let interval_secs: u64 =
            env_parse("EMAIL_PROCESS_INTERVAL_SECS", DEFAULT_PROCESS_INTERVAL_SECS)?;
        if interval_secs == 0 {
            return Err(ConfigError::ParseError {
                key: "EMAIL_PROCESS_INTERVAL_SECS".to_string(),
                details: "must be at least 1".to_string(),
            });
        }

        let batch_size: u64 = env_parse("EMAIL_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        if batch_size == 0 {
            return Err(ConfigError::ParseError {
                key: "EMAIL_BATCH_SIZE".to_string(),
                details: "must be at least 1".to_string(),
            });
        }

        let processor_id = std::env::var("EMAIL_PROCESSOR_ID")
            .ok()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        if processor_id
            .as_ref()
            .is_some_and(|id| id.chars().count() > MAX_PROCESSOR_ID_LEN)
        {
            return Err(ConfigError::ParseError {
                key: "EMAIL_PROCESSOR_ID".to_string(),
                details: format!("must be at most {} characters", MAX_PROCESSOR_ID_LEN),
            });
        }

        Ok(Self {
            environment: Environment::from_env(),
            database: PostgresConfig::from_env()?,
            admin: ServerConfig::from_env()?,
            process_interval: Duration::from_secs(interval_secs),
            batch_size,
            processor_id,
            transport: env_parse("EMAIL_TRANSPORT", TransportKind::default())?,
        })
    }
}
