// Prompt Cache Service
//
// Caches generated SQL keyed by the normalized prompt so repeated questions
// skip the AI service. Entries expire after a fixed TTL and are never
// overwritten while still fresh.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// Canonical cache key for a prompt: trimmed and lower-cased
pub fn normalize_prompt(prompt: &str) -> String {
    prompt.trim().to_lowercase()
}

/// Generated SQL kept for a normalized prompt
#[derive(Debug, Clone, PartialEq)]
pub struct CachedGeneration {
    pub sql: String,
    pub is_ai_generated: bool,
    pub cached_at: DateTime<Utc>,
}

impl CachedGeneration {
    pub fn new(sql: impl Into<String>, is_ai_generated: bool) -> Self {
        Self {
            sql: sql.into(),
            is_ai_generated,
            cached_at: Utc::now(),
        }
    }

    /// Expired once the age reaches the TTL
    fn is_expired_at(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.cached_at >= ttl
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses
    pub misses: u64,
    /// Total successful inserts
    pub inserts: u64,
    /// Total expirations
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Prompt → SQL cache shared by all in-flight requests
///
/// All synchronization is internal; callers never lock. There is no
/// single-flight guarantee: two concurrent misses for the same prompt both
/// reach the AI service and the first `put` wins.
pub struct PromptCache {
    entries: RwLock<HashMap<String, CachedGeneration>>,
    ttl: chrono::Duration,
    stats: Mutex<CacheStats>,
}

impl PromptCache {
    /// Create a cache whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Create a cache with a TTL in minutes
    pub fn with_ttl_minutes(minutes: u64) -> Self {
        Self::new(Duration::from_secs(minutes.saturating_mul(60)))
    }

    /// Get the cached generation for a normalized prompt, if present and fresh
    pub fn get(&self, key: &str) -> Option<CachedGeneration> {
        self.get_at(key, Utc::now())
    }

    pub(crate) fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<CachedGeneration> {
        let lookup = self.read_entries().get(key).cloned();

        match lookup {
            Some(cached) if cached.is_expired_at(self.ttl, now) => {
                // Only drop the entry we saw; a concurrent put may have replaced it
                let mut entries = self.write_entries();
                if entries
                    .get(key)
                    .is_some_and(|current| current.is_expired_at(self.ttl, now))
                {
                    entries.remove(key);
                }
                drop(entries);

                self.update_stats(|stats| {
                    stats.misses += 1;
                    stats.expirations += 1;
                });
                tracing::debug!("Prompt cache expired for key: {}", key);
                None
            }
            Some(cached) => {
                self.update_stats(|stats| stats.hits += 1);
                tracing::debug!("Prompt cache hit for key: {}", key);
                Some(cached)
            }
            None => {
                self.update_stats(|stats| stats.misses += 1);
                tracing::debug!("Prompt cache miss for key: {}", key);
                None
            }
        }
    }

    /// Store a generation unless a fresh entry already exists
    ///
    /// Returns true when the value was inserted.
    pub fn put(&self, key: impl Into<String>, value: CachedGeneration) -> bool {
        self.put_at(key.into(), value, Utc::now())
    }

    pub(crate) fn put_at(&self, key: String, value: CachedGeneration, now: DateTime<Utc>) -> bool {
        let mut entries = self.write_entries();

        if let Some(existing) = entries.get(&key) {
            if !existing.is_expired_at(self.ttl, now) {
                tracing::debug!("Prompt cache already holds key: {}", key);
                return false;
            }
        }

        entries.insert(key.clone(), value);
        let size = entries.len();
        drop(entries);

        self.update_stats(|stats| stats.inserts += 1);
        tracing::debug!("Cached SQL for key: {} (cache size: {})", key, size);
        true
    }

    /// Clear all cache entries, returning how many were removed
    pub fn clear(&self) -> usize {
        let mut entries = self.write_entries();
        let count = entries.len();
        entries.clear();

        tracing::info!("Cleared {} prompt cache entries", count);
        count
    }

    /// Remove expired entries, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.write_entries();
        let before = entries.len();
        entries.retain(|_, cached| !cached.is_expired_at(self.ttl, now));
        let removed = before - entries.len();
        drop(entries);

        if removed > 0 {
            self.update_stats(|stats| stats.expirations += removed as u64);
            tracing::info!("Cleaned up {} expired prompt cache entries", removed);
        }
        removed
    }

    /// Get current cache size
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn update_stats(&self, update: impl FnOnce(&mut CacheStats)) {
        let mut stats = self
            .stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        update(&mut stats);
    }

    // A panic while holding the lock cannot leave a half-written entry, so
    // poisoned guards are recovered instead of propagated
    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, CachedGeneration>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, CachedGeneration>> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for PromptCache {
    /// Five minute TTL
    fn default() -> Self {
        Self::with_ttl_minutes(5)
    }
}
