//! Storage engine for junkmail.
//!
//! Message bodies and per-recipient indexes live in the ephemeral store with
//! the retention in force when they were written. Counters and address
//! metadata live in the durable registry. The two are kept in step on a
//! best-effort basis: multi-key sequences are not atomic, and the reconciler
//! repairs what silent expiry or a failed step leaves behind.

mod delete;

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info};

use crate::datetime::{format_millis, now_millis};
use crate::db::Database;
use crate::mail::{decode_email, encode_email, Email, InboxAddress};
use crate::registry::{AddressRecord, AddressRepository, RegistryStats};
use crate::settings::{Retention, RetentionPolicy};
use crate::store::keys::{address_key, email_key, inbox_key};
use crate::store::{EphemeralStore, Order};
use crate::Result;

/// Default page size for address listings.
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Email storage over an ephemeral store and the durable registry.
pub struct StorageEngine<S> {
    store: S,
    db: Database,
    retention: Arc<RetentionPolicy>,
    permanent_addresses: bool,
}

impl<S: EphemeralStore> StorageEngine<S> {
    /// Create a storage engine.
    ///
    /// With `permanent_addresses` set, inbox views are stored without a TTL
    /// and report `expires_at = 0`.
    pub fn new(
        store: S,
        db: Database,
        retention: Arc<RetentionPolicy>,
        permanent_addresses: bool,
    ) -> Self {
        Self {
            store,
            db,
            retention,
            permanent_addresses,
        }
    }

    /// The ephemeral store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The durable database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// The retention policy applied to new writes.
    pub fn retention(&self) -> &RetentionPolicy {
        &self.retention
    }

    fn registry(&self) -> AddressRepository<'_> {
        AddressRepository::new(self.db.pool())
    }

    /// Store an email using the retention in force right now.
    pub async fn store_email(&self, email: &Email) -> Result<()> {
        let retention = self.retention.get();
        self.store_email_with(email, retention).await
    }

    /// Store an email with an explicit retention.
    ///
    /// The body and every recipient index get `retention` as their TTL.
    /// A recipient's counter only moves when its index did not already hold
    /// the id, so storing the same email twice counts it once. Recipients
    /// without an address record get an inbox index but no record.
    pub async fn store_email_with(&self, email: &Email, retention: Retention) -> Result<()> {
        let ttl = retention.as_secs();
        let data = encode_email(email)?;
        self.store.set(&email_key(&email.id), &data, Some(ttl)).await?;

        let mut newly_indexed = Vec::with_capacity(email.to.len());
        for recipient in email.recipients() {
            let key = inbox_key(recipient);
            if self.store.zadd(&key, email.received_at, &email.id).await? {
                newly_indexed.push(recipient);
            }
            self.store.expire(&key, ttl).await?;
        }

        let registry = self.registry();
        for recipient in newly_indexed {
            if !registry.increment(recipient).await? {
                debug!("No address record for {}, counter not kept", recipient);
            }
        }

        debug!(
            "Stored email {} received {} for {} recipient(s), ttl {}s",
            email.id,
            format_millis(email.received_at),
            email.to.len(),
            ttl
        );
        Ok(())
    }

    /// Get an email by id. Expired and unknown ids both yield `None`.
    pub async fn get_email(&self, id: &str) -> Result<Option<Email>> {
        match self.store.get(&email_key(id)).await? {
            Some(data) => Ok(Some(decode_email(&data)?)),
            None => Ok(None),
        }
    }

    /// All emails indexed for an address, newest first.
    ///
    /// Ids whose body has already expired are skipped.
    pub async fn get_inbox_emails(&self, address: &str) -> Result<Vec<Email>> {
        let ids = self
            .store
            .zrange(&inbox_key(address), Order::Descending)
            .await?;

        let fetched = join_all(ids.iter().map(|id| self.get_email(id))).await;

        let mut emails = Vec::with_capacity(fetched.len());
        for email in fetched {
            if let Some(email) = email? {
                emails.push(email);
            }
        }
        Ok(emails)
    }

    /// Create the inbox view for an address and register it.
    ///
    /// An existing view is returned unchanged. The registry record is created
    /// only if absent, so its counter and creation time survive.
    pub async fn create_inbox_address(&self, address: &str) -> Result<InboxAddress> {
        if let Some(existing) = self.get_inbox_address(address).await? {
            self.registry().create(address, existing.created_at).await?;
            return Ok(existing);
        }

        let now = now_millis();
        let (expires_at, ttl) = if self.permanent_addresses {
            (0, None)
        } else {
            let retention = self.retention.get();
            (now + retention.as_millis(), Some(retention.as_secs()))
        };

        let inbox = InboxAddress {
            address: address.to_string(),
            created_at: now,
            expires_at,
        };
        self.store
            .set(&address_key(address), &serde_json::to_string(&inbox)?, ttl)
            .await?;
        self.registry().create(address, now).await?;

        info!("Created inbox address {}", address);
        Ok(inbox)
    }

    /// The inbox view for an address, if present and unexpired.
    pub async fn get_inbox_address(&self, address: &str) -> Result<Option<InboxAddress>> {
        match self.store.get(&address_key(address)).await? {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    /// Open an inbox: create the address on first access, then list its
    /// emails.
    pub async fn open_inbox(&self, address: &str) -> Result<(InboxAddress, Vec<Email>)> {
        let inbox = self.create_inbox_address(address).await?;
        let emails = self.get_inbox_emails(address).await?;
        Ok((inbox, emails))
    }

    /// The durable record for an address.
    pub async fn get_address_record(&self, address: &str) -> Result<Option<AddressRecord>> {
        self.registry().get(address).await
    }

    /// Registered addresses, newest first.
    pub async fn list_addresses(&self, limit: i64, offset: i64) -> Result<Vec<AddressRecord>> {
        self.registry().list(limit, offset).await
    }

    /// Registry totals.
    pub async fn stats(&self) -> Result<RegistryStats> {
        self.registry().stats().await
    }
}

impl<S> std::fmt::Debug for StorageEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("retention", &self.retention)
            .field("permanent_addresses", &self.permanent_addresses)
            .finish_non_exhaustive()
    }
}
