use crate::models::{AuthMode, TransportConfig};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "email_config")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub smtp_server: String,
    pub smtp_port: i32,
    pub username: String,
    pub password: Option<String>,
    pub auth_type: AuthMode,
    pub use_auth: bool,
    pub timeout_seconds: i64,
    pub max_retries: i32,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

// Out-of-range columns (written by hand or by older tooling) fall back to the
// defaults rather than failing the load.
impl From<Model> for TransportConfig {
    fn from(model: Model) -> Self {
        let defaults = TransportConfig::default();
        Self {
            server: model.smtp_server,
            port: u16::try_from(model.smtp_port).unwrap_or(defaults.port),
            auth_principal: model.username,
            auth_secret: model.password,
            auth_mode: model.auth_type,
            use_auth: model.use_auth,
            timeout_seconds: u64::try_from(model.timeout_seconds)
                .ok()
                .filter(|t| *t > 0)
                .unwrap_or(defaults.timeout_seconds),
            max_retries: u32::try_from(model.max_retries).unwrap_or(defaults.max_retries),
        }
    }
}

impl From<TransportConfig> for ActiveModel {
    fn from(config: TransportConfig) -> Self {
        ActiveModel {
            id: Set(Uuid::now_v7()),
            smtp_server: Set(config.server),
            smtp_port: Set(i32::from(config.port)),
            username: Set(config.auth_principal),
            password: Set(config.auth_secret),
            auth_type: Set(config.auth_mode),
            use_auth: Set(config.use_auth),
            timeout_seconds: Set(i64::try_from(config.timeout_seconds).unwrap_or(i64::MAX)),
            max_retries: Set(i32::try_from(config.max_retries).unwrap_or(i32::MAX)),
            created_at: Set(chrono::Utc::now().into()),
        }
    }
}
