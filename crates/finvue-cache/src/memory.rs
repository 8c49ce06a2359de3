//! Bounded in-memory session cache.

use async_trait::async_trait;
use chrono::Utc;
use finvue_core::{CompanyMetrics, DataError, Result, SessionCache};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Default number of tickers kept per session.
pub const DEFAULT_CAPACITY: usize = 32;

/// Cache entry with timestamp for TTL-based invalidation.
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    data: T,
    cached_at: chrono::DateTime<Utc>,
    /// Monotonic insertion counter, used to find the oldest entry.
    seq: u64,
}

impl<T> CacheEntry<T> {
    fn new(data: T, seq: u64) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
            seq,
        }
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.cached_at);
        age > chrono::TimeDelta::from_std(ttl).unwrap_or(chrono::TimeDelta::MAX)
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry<CompanyMetrics>>,
    next_seq: u64,
}

/// In-memory cache of fetched metrics, keyed by ticker.
///
/// Holds at most `capacity` tickers; storing a new ticker in a full cache
/// evicts the one stored longest ago. Data is lost when the cache is dropped.
#[derive(Debug)]
pub struct InMemoryCache {
    inner: RwLock<Inner>,
    capacity: usize,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCache {
    /// Create a new empty cache with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new empty cache holding at most `capacity` tickers.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    /// Maximum number of tickers held.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

fn key(ticker: &str) -> Result<String> {
    let ticker = ticker.trim();
    if ticker.is_empty() {
        return Err(DataError::Cache("empty ticker key".to_string()));
    }
    Ok(ticker.to_uppercase())
}

#[async_trait]
impl SessionCache for InMemoryCache {
    #[instrument(skip(self), fields(ticker = %ticker))]
    async fn get(&self, ticker: &str) -> Result<Option<CompanyMetrics>> {
        let key = key(ticker)?;
        let cache = self.inner.read().await;
        match cache.entries.get(&key) {
            Some(entry) => {
                debug!("Cache hit for metrics");
                Ok(Some(entry.data.clone()))
            }
            None => {
                debug!("Cache miss for metrics");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, metrics), fields(ticker = %ticker, concepts = metrics.len()))]
    async fn put(&self, ticker: &str, metrics: &CompanyMetrics) -> Result<()> {
        let key = key(ticker)?;
        let mut cache = self.inner.write().await;

        if !cache.entries.contains_key(&key) && cache.entries.len() >= self.capacity {
            let oldest = cache
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.seq)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                cache.entries.remove(&oldest);
                debug!(evicted = %oldest, "Evicted oldest cache entry");
            }
        }

        let seq = cache.next_seq;
        cache.next_seq += 1;
        cache.entries.insert(key, CacheEntry::new(metrics.clone(), seq));
        debug!("Cached metrics");
        Ok(())
    }

    #[instrument(skip(self), fields(ticker = %ticker))]
    async fn invalidate(&self, ticker: &str) -> Result<bool> {
        let key = key(ticker)?;
        Ok(self.inner.write().await.entries.remove(&key).is_some())
    }

    #[instrument(skip(self))]
    async fn invalidate_stale(&self, ttl: Duration) -> Result<usize> {
        let mut cache = self.inner.write().await;
        let before = cache.entries.len();
        cache.entries.retain(|_, entry| !entry.is_stale(ttl));
        let removed = before - cache.entries.len();

        if removed > 0 {
            debug!("Invalidated {} stale cache entries", removed);
        }

        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        self.inner.write().await.entries.clear();
        debug!("Cleared all cache entries");
        Ok(())
    }

    async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }
}
