//! No-op cache implementation.

use async_trait::async_trait;
use finvue_core::{CompanyMetrics, Result, SessionCache};
use std::time::Duration;
use tracing::trace;

/// A no-op cache that doesn't store anything.
///
/// `get` always returns `Ok(None)` and `put` returns `Ok(())`.
/// Useful for disabling caching so every refresh hits the source.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl NoopCache {
    /// Create a new no-op cache.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionCache for NoopCache {
    async fn get(&self, _ticker: &str) -> Result<Option<CompanyMetrics>> {
        trace!("NoopCache: get called, returning None");
        Ok(None)
    }

    async fn put(&self, _ticker: &str, _metrics: &CompanyMetrics) -> Result<()> {
        trace!("NoopCache: put called, doing nothing");
        Ok(())
    }

    async fn invalidate(&self, _ticker: &str) -> Result<bool> {
        Ok(false)
    }

    async fn invalidate_stale(&self, _ttl: Duration) -> Result<usize> {
        Ok(0)
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }

    async fn len(&self) -> usize {
        0
    }
}
