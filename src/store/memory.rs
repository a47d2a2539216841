//! In-process backend for the ephemeral store.
//!
//! Expiry is lazy: an expired key is dropped the next time it is touched.
//! Times come from `tokio::time`, so tests can pause and advance the clock.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{EphemeralStore, Order};
use crate::{JunkmailError, Result};

#[derive(Debug)]
enum Value {
    Str(String),
    /// Kept sorted by (score, member), like a Redis sorted set.
    ZSet(Vec<(i64, String)>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Ephemeral store held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

fn wrong_type(key: &str) -> JunkmailError {
    JunkmailError::Store(format!(
        "WRONGTYPE operation against key {key} holding the wrong kind of value"
    ))
}

/// Drop `key` if it has expired.
fn purge_expired(map: &mut HashMap<String, Entry>, key: &str) {
    let now = Instant::now();
    if map.get(key).is_some_and(|e| e.is_expired(now)) {
        map.remove(key);
    }
}

/// The entry for `key` if it is present and unexpired.
fn live<'a>(map: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
    purge_expired(map, key);
    map.get_mut(key)
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let mut map = self.entries.lock().await;
        map.retain(|_, e| !e.is_expired(now));
        map.len()
    }

    /// Whether the store holds no live keys.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl EphemeralStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<()> {
        let expires_at = ttl_secs.map(|s| Instant::now() + Duration::from_secs(s));
        let mut map = self.entries.lock().await;
        map.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut map = self.entries.lock().await;
        match live(&mut map, key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut map = self.entries.lock().await;
        purge_expired(&mut map, key);
        Ok(map.remove(key).is_some())
    }

    async fn zadd(&self, key: &str, score: i64, member: &str) -> Result<bool> {
        let mut map = self.entries.lock().await;
        purge_expired(&mut map, key);
        let entry = map.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::ZSet(Vec::new()),
            expires_at: None,
        });
        let Value::ZSet(set) = &mut entry.value else {
            return Err(wrong_type(key));
        };

        let existed = match set.iter().position(|(_, m)| m == member) {
            Some(pos) => {
                set.remove(pos);
                true
            }
            None => false,
        };
        let at = set.partition_point(|(s, m)| (*s, m.as_str()) < (score, member));
        set.insert(at, (score, member.to_string()));
        Ok(!existed)
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<bool> {
        let mut map = self.entries.lock().await;
        let Some(entry) = live(&mut map, key) else {
            return Ok(false);
        };
        let Value::ZSet(set) = &mut entry.value else {
            return Err(wrong_type(key));
        };

        let Some(pos) = set.iter().position(|(_, m)| m == member) else {
            return Ok(false);
        };
        set.remove(pos);
        // Redis drops empty sorted sets.
        if set.is_empty() {
            map.remove(key);
        }
        Ok(true)
    }

    async fn zrange(&self, key: &str, order: Order) -> Result<Vec<String>> {
        let mut map = self.entries.lock().await;
        let Some(entry) = live(&mut map, key) else {
            return Ok(Vec::new());
        };
        let Value::ZSet(set) = &entry.value else {
            return Err(wrong_type(key));
        };

        let members = set.iter().map(|(_, m)| m.clone());
        Ok(match order {
            Order::Ascending => members.collect(),
            Order::Descending => members.rev().collect(),
        })
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        let mut map = self.entries.lock().await;
        match live(&mut map, key) {
            None => Ok(0),
            Some(Entry {
                value: Value::ZSet(set),
                ..
            }) => Ok(set.len() as u64),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool> {
        let mut map = self.entries.lock().await;
        match live(&mut map, key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl_secs));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        let mut map = self.entries.lock().await;
        let Some(entry) = live(&mut map, key) else {
            return Ok(None);
        };
        Ok(entry.expires_at.map(|at| {
            let remaining = at.saturating_duration_since(Instant::now());
            ((remaining.as_millis() + 500) / 1000) as u64
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_del() {
        let store = MemoryStore::new();

        store.set("k", "v", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.ttl("k").await.unwrap(), None);

        assert!(store.del("k").await.unwrap());
        assert!(!store.del("k").await.unwrap());
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_with_ttl_expires() {
        let store = MemoryStore::new();

        store.set("k", "v", Some(60)).await.unwrap();
        assert_eq!(store.ttl("k").await.unwrap(), Some(60));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_replaces_ttl() {
        let store = MemoryStore::new();

        store.set("k", "v1", Some(60)).await.unwrap();
        store.set("k", "v2", None).await.unwrap();

        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_sorted_set_order() {
        let store = MemoryStore::new();

        assert!(store.zadd("z", 20, "b").await.unwrap());
        assert!(store.zadd("z", 10, "a").await.unwrap());
        assert!(store.zadd("z", 30, "c").await.unwrap());

        assert_eq!(
            store.zrange("z", Order::Ascending).await.unwrap(),
            vec!["a", "b", "c"]
        );
        assert_eq!(
            store.zrange("z", Order::Descending).await.unwrap(),
            vec!["c", "b", "a"]
        );
        assert_eq!(store.zcard("z").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_zadd_existing_member_rescores() {
        let store = MemoryStore::new();

        assert!(store.zadd("z", 10, "a").await.unwrap());
        assert!(store.zadd("z", 20, "b").await.unwrap());
        assert!(!store.zadd("z", 30, "a").await.unwrap());

        assert_eq!(store.zcard("z").await.unwrap(), 2);
        assert_eq!(
            store.zrange("z", Order::Ascending).await.unwrap(),
            vec!["b", "a"]
        );
    }

    #[tokio::test]
    async fn test_zrem_drops_empty_set() {
        let store = MemoryStore::new();

        store.zadd("z", 1, "a").await.unwrap();
        assert!(store.zrem("z", "a").await.unwrap());
        assert!(!store.zrem("z", "a").await.unwrap());
        assert!(store.is_empty().await);
        assert!(store.zrange("z", Order::Descending).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_sorted_set() {
        let store = MemoryStore::new();

        assert!(!store.expire("z", 60).await.unwrap());

        store.zadd("z", 1, "a").await.unwrap();
        assert!(store.expire("z", 60).await.unwrap());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.zcard("z").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let store = MemoryStore::new();

        store.set("k", "v", None).await.unwrap();
        assert!(matches!(
            store.zadd("k", 1, "a").await,
            Err(JunkmailError::Store(_))
        ));

        store.zadd("z", 1, "a").await.unwrap();
        assert!(store.get("z").await.is_err());
    }
}
