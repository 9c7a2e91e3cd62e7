//! Generic TTL cache with lazy check-on-read eviction.
//!
//! Entries carry an optional expiry timestamp. An entry whose expiry has
//! passed is treated as absent and removed on the next lookup that touches
//! it; there is no background sweep thread. At the access pattern of this
//! system (one entry per installation, read on every task) lazy eviction is
//! sufficient and keeps the implementation to a single map behind a lock.
//!
//! Concurrent callers that miss on the same key may race to populate it:
//! [`TtlCache::get_or_try_insert_with`] runs its factory without holding the
//! lock, so a cold miss can trigger duplicate factory calls. Whichever call
//! finishes last wins the slot; all later lookups read the shared value. For
//! idempotent factories (token minting, query-text loading) the duplicate
//! work is a rare extra network call, accepted instead of per-key locking.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use tokio::sync::RwLock;

/// A single cached value with an optional expiry.
struct CacheEntry<V> {
    value: V,
    /// `None` means the entry lives for the process lifetime.
    expires_at: Option<DateTime<Utc>>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => false,
        }
    }
}

/// In-memory key-value cache with per-entry TTL.
///
/// Shared, in-process, mutable state: create one instance at startup and pass
/// it by reference (`Arc`) to every component that needs it, so it can be
/// swapped for a fresh instance in tests and its lifetime stays explicit.
///
/// # Examples
///
/// ```rust
/// use docwright_github::TtlCache;
/// use chrono::Duration;
///
/// # async fn example() {
/// let cache: TtlCache<String, String> = TtlCache::new();
///
/// cache.insert("query.team_repos".to_string(), "query {...}".to_string(), None).await;
/// assert!(cache.get(&"query.team_repos".to_string()).await.is_some());
/// # }
/// ```
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a key, evicting the entry if its TTL has elapsed.
    ///
    /// Returns `None` both for keys that were never inserted and for keys
    /// whose entry has expired.
    pub async fn get(&self, key: &K) -> Option<V> {
        let now = Utc::now();

        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired entry observed under the read lock; remove it under the
        // write lock. Re-check expiry in case a writer replaced it meanwhile.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if entry.is_expired(now) {
                entries.remove(key);
            } else {
                return Some(entry.value.clone());
            }
        }
        None
    }

    /// Insert a value with an optional TTL.
    ///
    /// A `ttl` of `None` caches the value for the process lifetime. Inserting
    /// over an existing key replaces it unconditionally.
    pub async fn insert(&self, key: K, value: V, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Utc::now() + ttl);
        let mut entries = self.entries.write().await;
        entries.insert(key, CacheEntry { value, expires_at });
    }

    /// Remove a key regardless of its expiry state.
    pub async fn invalidate(&self, key: &K) {
        let mut entries = self.entries.write().await;
        entries.remove(key);
    }

    /// Return the cached value for `key`, or populate it from `factory`.
    ///
    /// On a hit with an unexpired entry the cached value is returned and the
    /// factory never runs. On a miss (or an expired entry) the factory runs
    /// *without* the cache lock held and its result is stored with `ttl`.
    /// Factory errors are propagated and leave the cache unchanged.
    pub async fn get_or_try_insert_with<F, Fut, E>(
        &self,
        key: K,
        ttl: Option<Duration>,
        factory: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key).await {
            return Ok(value);
        }

        let value = factory().await?;
        self.insert(key, value.clone(), ttl).await;
        Ok(value)
    }

    /// Number of entries currently stored, including not-yet-evicted expired
    /// entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache currently stores no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
