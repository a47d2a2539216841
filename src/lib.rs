//! junkmail - disposable email core
//!
//! Receives mail over SMTP, decodes it, keeps message bodies and
//! per-recipient inboxes in an expiring store, and tracks every address in a
//! durable SQLite registry.

pub mod address;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod logging;
pub mod mail;
pub mod reconcile;
pub mod registry;
pub mod server;
pub mod settings;
pub mod storage;
pub mod store;

pub use address::{
    generate_address, is_valid_email, is_valid_local_part, resolve_requested_address,
    AddressError,
};
pub use config::{Config, StoreBackend};
pub use db::Database;
pub use error::{JunkmailError, Result};
pub use mail::{decode_message, Attachment, Email, EmailAddress, InboxAddress};
pub use reconcile::{start_reconciler, ReconcileReport, Reconciler};
pub use registry::{AddressRecord, AddressRepository, RegistryStats};
pub use server::{SessionSettings, SmtpServer, SmtpSession};
pub use settings::{Retention, RetentionPolicy, SettingsRepository};
pub use storage::StorageEngine;
pub use store::{EphemeralStore, MemoryStore, RedisStore};
