//! Address repository for junkmail.
//!
//! Counter updates are single-statement so they stay correct when the
//! receiver and delete callers hit the same address concurrently.

use tracing::debug;

use super::types::{AddressRecord, RegistryStats};
use crate::datetime::now_millis;
use crate::db::DbPool;
use crate::Result;

const SELECT_COLUMNS: &str = "SELECT id, address, created_at, email_count, last_email_at FROM addresses";

/// Repository for the durable address registry.
pub struct AddressRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> AddressRepository<'a> {
    /// Create a new AddressRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a record if the address is not registered yet.
    ///
    /// Returns true if a record was inserted. An existing record keeps its
    /// counter and creation time.
    pub async fn create(&self, address: &str, created_at: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO addresses (address, created_at) VALUES (?, ?)
             ON CONFLICT(address) DO NOTHING",
        )
        .bind(address)
        .bind(created_at)
        .execute(self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        debug!("create address {} (inserted: {})", address, inserted);
        Ok(inserted)
    }

    /// Get the record for an address.
    pub async fn get(&self, address: &str) -> Result<Option<AddressRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE address = ?");
        let record = sqlx::query_as::<_, AddressRecord>(&sql)
            .bind(address)
            .fetch_optional(self.pool)
            .await?;
        Ok(record)
    }

    /// Count one more message for an address and stamp `last_email_at`.
    ///
    /// Unregistered addresses are left alone: inbound mail never creates a
    /// record.
    pub async fn increment(&self, address: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE addresses SET email_count = email_count + 1, last_email_at = ?
             WHERE address = ?",
        )
        .bind(now_millis())
        .bind(address)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count one message less, never going below zero.
    pub async fn decrement(&self, address: &str) -> Result<()> {
        sqlx::query(
            "UPDATE addresses
             SET email_count = CASE WHEN email_count > 0 THEN email_count - 1 ELSE 0 END
             WHERE address = ?",
        )
        .bind(address)
        .execute(self.pool)
        .await?;
        debug!("Decremented email count for {}", address);
        Ok(())
    }

    /// Reset the counter and clear `last_email_at`.
    pub async fn reset_count(&self, address: &str) -> Result<()> {
        sqlx::query("UPDATE addresses SET email_count = 0, last_email_at = NULL WHERE address = ?")
            .bind(address)
            .execute(self.pool)
            .await?;
        debug!("Reset email count for {}", address);
        Ok(())
    }

    /// Replace the counter with a recounted value, but only while it still
    /// reads `expected`.
    ///
    /// Returns false when the counter moved since `expected` was read (or the
    /// record is gone); the concurrent change is kept.
    pub async fn set_count(&self, address: &str, expected: i64, count: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE addresses SET email_count = ? WHERE address = ? AND email_count = ?",
        )
        .bind(count.max(0))
        .bind(address)
        .bind(expected)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete the record entirely.
    ///
    /// Returns true if a record was deleted, false if not found.
    pub async fn remove(&self, address: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM addresses WHERE address = ?")
            .bind(address)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List records, newest first.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<AddressRecord>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?");
        let records = sqlx::query_as::<_, AddressRecord>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;
        Ok(records)
    }

    /// Aggregate totals over all records.
    pub async fn stats(&self) -> Result<RegistryStats> {
        let (total_addresses, total_emails): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(email_count), 0) FROM addresses",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(RegistryStats {
            total_addresses,
            total_emails,
        })
    }
}
