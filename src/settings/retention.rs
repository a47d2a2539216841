//! Retention policy: the lifetime applied to newly written ephemeral entries.
//!
//! The value is read once per write and handed to the store explicitly, so a
//! change only affects entries written afterwards.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{info, warn};

use super::repository::SettingsRepository;
use crate::db::Database;
use crate::{JunkmailError, Result};

/// Smallest accepted retention (1 minute).
pub const MIN_RETENTION_SECS: u64 = 60;

/// Largest accepted retention (365 days).
pub const MAX_RETENTION_SECS: u64 = 31_536_000;

/// Settings key holding the retention in seconds.
pub const RETENTION_SETTING_KEY: &str = "email_retention";

/// A retention value known to be within the accepted range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Retention(u64);

impl Retention {
    /// Validate a retention in seconds.
    pub fn new(secs: u64) -> Result<Self> {
        if !(MIN_RETENTION_SECS..=MAX_RETENTION_SECS).contains(&secs) {
            return Err(JunkmailError::Validation(format!(
                "retention must be between {MIN_RETENTION_SECS} and {MAX_RETENTION_SECS} seconds, got {secs}"
            )));
        }
        Ok(Self(secs))
    }

    /// Seconds.
    pub fn as_secs(self) -> u64 {
        self.0
    }

    /// Milliseconds, for absolute expiry timestamps.
    pub fn as_millis(self) -> i64 {
        (self.0 * 1000) as i64
    }
}

/// Process-wide retention setting backed by the settings table.
pub struct RetentionPolicy {
    db: Database,
    secs: AtomicU64,
}

impl RetentionPolicy {
    /// Load the persisted retention, or use `default` when none is stored.
    ///
    /// A persisted value that is unparseable or out of range is ignored with a
    /// warning.
    pub async fn load(db: Database, default: Retention) -> Result<Self> {
        let repo = SettingsRepository::new(db.pool());
        let stored = repo.get(RETENTION_SETTING_KEY).await?;

        let current = match stored {
            Some(raw) => match parse_stored(&raw) {
                Ok(r) => r,
                Err(e) => {
                    warn!("Ignoring stored retention {:?}: {}", raw, e);
                    default
                }
            },
            None => default,
        };

        info!("Email retention is {} seconds", current.as_secs());

        Ok(Self {
            db,
            secs: AtomicU64::new(current.as_secs()),
        })
    }

    /// Current retention.
    pub fn get(&self) -> Retention {
        Retention(self.secs.load(Ordering::Acquire))
    }

    /// Change the retention for future writes.
    ///
    /// Out-of-range values are rejected before anything is persisted or
    /// swapped in.
    pub async fn set(&self, secs: u64) -> Result<Retention> {
        let retention = Retention::new(secs)?;

        SettingsRepository::new(self.db.pool())
            .set(RETENTION_SETTING_KEY, &retention.as_secs().to_string())
            .await?;
        self.secs.store(retention.as_secs(), Ordering::Release);

        info!("Email retention changed to {} seconds", retention.as_secs());
        Ok(retention)
    }
}

fn parse_stored(raw: &str) -> Result<Retention> {
    let secs = raw
        .trim()
        .parse::<u64>()
        .map_err(|e| JunkmailError::Validation(format!("invalid {RETENTION_SETTING_KEY}: {e}")))?;
    Retention::new(secs)
}

impl std::fmt::Debug for RetentionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionPolicy")
            .field("secs", &self.secs.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hour() -> Retention {
        Retention::new(3600).unwrap()
    }

    #[test]
    fn test_retention_bounds() {
        assert!(Retention::new(59).is_err());
        assert!(Retention::new(60).is_ok());
        assert!(Retention::new(31_536_000).is_ok());
        assert!(Retention::new(31_536_001).is_err());
    }

    #[test]
    fn test_retention_units() {
        let r = Retention::new(90).unwrap();
        assert_eq!(r.as_secs(), 90);
        assert_eq!(r.as_millis(), 90_000);
    }

    #[tokio::test]
    async fn test_load_uses_default() {
        let db = Database::open_in_memory().await.unwrap();
        let policy = RetentionPolicy::load(db, hour()).await.unwrap();
        assert_eq!(policy.get().as_secs(), 3600);
    }

    #[tokio::test]
    async fn test_set_persists() {
        let db = Database::open_in_memory().await.unwrap();
        let policy = RetentionPolicy::load(db.clone(), hour()).await.unwrap();

        policy.set(7200).await.unwrap();
        assert_eq!(policy.get().as_secs(), 7200);

        let reloaded = RetentionPolicy::load(db, hour()).await.unwrap();
        assert_eq!(reloaded.get().as_secs(), 7200);
    }

    #[tokio::test]
    async fn test_rejected_value_leaves_policy_unchanged() {
        let db = Database::open_in_memory().await.unwrap();
        let policy = RetentionPolicy::load(db.clone(), hour()).await.unwrap();
        policy.set(600).await.unwrap();

        let result = policy.set(30).await;
        assert!(matches!(result, Err(JunkmailError::Validation(_))));
        assert_eq!(policy.get().as_secs(), 600);

        let stored = SettingsRepository::new(db.pool())
            .get(RETENTION_SETTING_KEY)
            .await
            .unwrap();
        assert_eq!(stored.as_deref(), Some("600"));

        assert!(policy.set(31_536_001).await.is_err());
        assert_eq!(policy.get().as_secs(), 600);
    }

    #[tokio::test]
    async fn test_load_ignores_corrupt_setting() {
        let db = Database::open_in_memory().await.unwrap();
        SettingsRepository::new(db.pool())
            .set(RETENTION_SETTING_KEY, "forever")
            .await
            .unwrap();

        let policy = RetentionPolicy::load(db, hour()).await.unwrap();
        assert_eq!(policy.get().as_secs(), 3600);
    }
}
