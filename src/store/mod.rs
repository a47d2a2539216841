//! Ephemeral key-value store for junkmail.
//!
//! Message bodies, per-recipient indexes and inbox views live here with a
//! time-to-live. The trait covers the small subset of Redis commands the
//! storage engine needs; every method is a single-key operation, so callers
//! get per-key atomicity and nothing more.

pub mod keys;
mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use std::future::Future;

use crate::Result;

/// Direction for reading a sorted-set index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Lowest score first.
    Ascending,
    /// Highest score first.
    Descending,
}

/// A TTL-bearing key-value store with sorted sets.
///
/// TTLs are whole seconds. `None` means the key does not expire.
pub trait EphemeralStore: Send + Sync + 'static {
    /// Check that the store is reachable.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;

    /// Set a string value, replacing any previous value and TTL.
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl_secs: Option<u64>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Get a string value if present and unexpired.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Delete a key of any type. Returns true if it existed.
    fn del(&self, key: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Add or re-score a sorted-set member. Returns true if the member is new.
    fn zadd(
        &self,
        key: &str,
        score: i64,
        member: &str,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Remove a sorted-set member. Returns true if it was present.
    fn zrem(&self, key: &str, member: &str) -> impl Future<Output = Result<bool>> + Send;

    /// All members of a sorted set in score order.
    fn zrange(&self, key: &str, order: Order) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Number of members in a sorted set.
    fn zcard(&self, key: &str) -> impl Future<Output = Result<u64>> + Send;

    /// Set a key's TTL. Returns false if the key does not exist.
    fn expire(&self, key: &str, ttl_secs: u64) -> impl Future<Output = Result<bool>> + Send;

    /// Remaining TTL in seconds; `None` for missing or non-expiring keys.
    fn ttl(&self, key: &str) -> impl Future<Output = Result<Option<u64>>> + Send;
}
