//! Rate snapshot caching with TTL support.

use async_trait::async_trait;
use chrono::Duration;
use dashmap::DashMap;
use ratewatch_common::{constants, expires_in, is_expired, RateMap, Timestamp};
use std::sync::Arc;
use tracing::debug;

use crate::error::CacheError;

/// Short-lived key/value store for rate mappings.
#[async_trait]
pub trait RateCache: Send + Sync {
    /// Get an unexpired entry.
    async fn get(&self, key: &str) -> Result<Option<RateMap>, CacheError>;

    /// Create or overwrite an entry with the given TTL.
    async fn set(&self, key: &str, rates: &RateMap, ttl: Duration) -> Result<(), CacheError>;
}

/// Cached rate entry.
#[derive(Debug, Clone)]
struct CacheEntry {
    rates: RateMap,
    expires_at: Timestamp,
}

impl CacheEntry {
    fn new(rates: RateMap, ttl: Duration) -> Self {
        Self {
            rates,
            expires_at: expires_in(ttl),
        }
    }

    fn is_valid(&self) -> bool {
        !is_expired(self.expires_at)
    }
}

/// Configuration for the in-memory cache.
#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    /// Default TTL for cached snapshots.
    pub default_ttl: Duration,
    /// Maximum number of entries before expired ones are swept.
    pub max_entries: usize,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: constants::rate_cache_ttl(),
            max_entries: 10000,
        }
    }
}

/// Thread-safe in-process rate cache with lazy expiry.
pub struct MemoryRateCache {
    cache: DashMap<String, CacheEntry>,
    config: RateCacheConfig,
}

impl MemoryRateCache {
    /// Create a new rate cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(RateCacheConfig::default())
    }

    /// Create a new rate cache with custom configuration.
    pub fn with_config(config: RateCacheConfig) -> Self {
        Self {
            cache: DashMap::new(),
            config,
        }
    }

    /// Get a mapping if present and unexpired.
    pub fn lookup(&self, key: &str) -> Option<RateMap> {
        if let Some(entry) = self.cache.get(key) {
            if entry.is_valid() {
                debug!(key, "Cache hit");
                return Some(entry.rates.clone());
            }

            debug!(key, "Cache entry expired");
            drop(entry);
            // A concurrent insert may have replaced the entry since the read
            self.cache.remove_if(key, |_, entry| !entry.is_valid());
        }

        debug!(key, "Cache miss");
        None
    }

    /// Insert a mapping with the default TTL.
    pub fn insert(&self, key: impl Into<String>, rates: RateMap) -> bool {
        self.insert_with_ttl(key, rates, self.config.default_ttl)
    }

    /// Insert a mapping with a custom TTL.
    ///
    /// Returns false, leaving the cache unchanged, when a new key would push
    /// the cache past `max_entries` even after expired entries are swept.
    /// Existing keys can always be overwritten.
    pub fn insert_with_ttl(&self, key: impl Into<String>, rates: RateMap, ttl: Duration) -> bool {
        let key = key.into();

        if !self.cache.contains_key(&key) && self.cache.len() >= self.config.max_entries {
            self.evict_expired();
            if self.cache.len() >= self.config.max_entries {
                debug!(key = %key, max_entries = self.config.max_entries, "Cache full, entry not stored");
                return false;
            }
        }

        self.cache.insert(key, CacheEntry::new(rates, ttl));
        true
    }

    /// Remove an entry.
    pub fn remove(&self, key: &str) {
        self.cache.remove(key);
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Get the number of entries in cache.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Evict expired entries.
    pub fn evict_expired(&self) {
        self.cache.retain(|_, entry| entry.is_valid());
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let total = self.cache.len();
        let valid = self.cache.iter().filter(|e| e.is_valid()).count();

        CacheStats {
            total_entries: total,
            valid_entries: valid,
            expired_entries: total - valid,
        }
    }
}

impl Default for MemoryRateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateCache for MemoryRateCache {
    async fn get(&self, key: &str) -> Result<Option<RateMap>, CacheError> {
        Ok(self.lookup(key))
    }

    async fn set(&self, key: &str, rates: &RateMap, ttl: Duration) -> Result<(), CacheError> {
        if self.insert_with_ttl(key, rates.clone(), ttl) {
            Ok(())
        } else {
            Err(CacheError::Full(self.config.max_entries))
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
}

/// Shared rate cache.
pub type SharedRateCache = Arc<dyn RateCache>;

/// Cache whose backend is always down.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct UnavailableCache {
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl UnavailableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of get/set calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn fail(&self) -> CacheError {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        CacheError::Backend("connection refused".to_string())
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateCache for UnavailableCache {
    async fn get(&self, _key: &str) -> Result<Option<RateMap>, CacheError> {
        Err(self.fail())
    }

    async fn set(&self, _key: &str, _rates: &RateMap, _ttl: Duration) -> Result<(), CacheError> {
        Err(self.fail())
    }
}
