//! Deletion paths that keep the ephemeral store and the registry in step.
//!
//! None of these roll back: a store error part way through is returned as
//! the operation's error and whatever was already removed stays removed.

use tracing::info;

use super::StorageEngine;
use crate::store::keys::{address_key, email_key, inbox_key};
use crate::store::{EphemeralStore, Order};
use crate::Result;

impl<S: EphemeralStore> StorageEngine<S> {
    /// Delete one email.
    ///
    /// Removes the body, then the id from each recipient's index, decrementing
    /// each recipient whose index held it. Returns the number of emails
    /// removed (0 if the email was not found).
    pub async fn delete_email(&self, id: &str) -> Result<usize> {
        let Some(email) = self.get_email(id).await? else {
            return Ok(0);
        };

        self.store.del(&email_key(id)).await?;

        let registry = self.registry();
        for recipient in email.recipients() {
            if self.store.zrem(&inbox_key(recipient), id).await? {
                registry.decrement(recipient).await?;
            }
        }

        info!("Deleted email {}", id);
        Ok(1)
    }

    /// Delete every email in an inbox. The address stays registered with a
    /// zero counter.
    pub async fn delete_all_inbox_emails(&self, address: &str) -> Result<usize> {
        let removed = self.purge_inbox(address).await?;
        self.registry().reset_count(address).await?;

        info!("Cleared {} email(s) from inbox {}", removed, address);
        Ok(removed)
    }

    /// Delete an address: its emails, its inbox view and its registry record.
    pub async fn delete_inbox_address(&self, address: &str) -> Result<usize> {
        let removed = self.purge_inbox(address).await?;
        self.store.del(&address_key(address)).await?;
        self.registry().remove(address).await?;

        info!("Removed address {} with {} email(s)", address, removed);
        Ok(removed)
    }

    /// Drop every body indexed under `address` and the index itself.
    ///
    /// A body shared with other recipients disappears for them too, so its id
    /// is also taken out of their indexes and counters.
    async fn purge_inbox(&self, address: &str) -> Result<usize> {
        let key = inbox_key(address);
        let ids = self.store.zrange(&key, Order::Ascending).await?;
        let registry = self.registry();

        for id in &ids {
            if let Some(email) = self.get_email(id).await? {
                for other in email.recipients().filter(|r| *r != address) {
                    if self.store.zrem(&inbox_key(other), id).await? {
                        registry.decrement(other).await?;
                    }
                }
            }
            self.store.del(&email_key(id)).await?;
        }
        self.store.del(&key).await?;

        Ok(ids.len())
    }
}
