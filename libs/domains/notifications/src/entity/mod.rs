//! SeaORM entities for the notification tables.
//!
//! `users` belongs to the reporting application and is only ever read.

pub mod email_config;
pub mod email_history;
pub mod email_queue;
pub mod processor_lease;
pub mod users;
