//! Runtime settings for junkmail.
//!
//! Settings live in the durable database. The only setting the core reads is
//! the email retention.

mod repository;
mod retention;

pub use repository::SettingsRepository;
pub use retention::{
    Retention, RetentionPolicy, MAX_RETENTION_SECS, MIN_RETENTION_SECS, RETENTION_SETTING_KEY,
};
