//! Cache trait for a dashboard session.
//!
//! This module defines the [`SessionCache`] trait: a bounded store of fetched
//! metrics keyed by entity ticker. A cache lives as long as the session that
//! owns it and is cleared when the session ends.

use async_trait::async_trait;
use std::time::Duration;

use crate::{error::Result, types::CompanyMetrics};

/// Trait for caching fetched metrics within a session.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Retrieves cached metrics for a ticker.
    ///
    /// Returns `Ok(Some(metrics))` if cached, `Ok(None)` if not cached.
    async fn get(&self, ticker: &str) -> Result<Option<CompanyMetrics>>;

    /// Stores metrics for a ticker, evicting the oldest entry if full.
    async fn put(&self, ticker: &str, metrics: &CompanyMetrics) -> Result<()>;

    /// Removes one ticker. Returns true if it was cached.
    async fn invalidate(&self, ticker: &str) -> Result<bool>;

    /// Removes entries older than the specified TTL.
    ///
    /// Returns the number of entries invalidated.
    async fn invalidate_stale(&self, ttl: Duration) -> Result<usize>;

    /// Clears all cached data.
    async fn clear(&self) -> Result<()>;

    /// Number of cached tickers.
    async fn len(&self) -> usize;

    /// Returns true if nothing is cached.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
