//! Taxonomy check cache using moka
//!
//! Analysis submission checks for an active global taxonomy every time.
//! Positive answers are reused for a TTL; negative ones are always re-asked
//! so a freshly saved taxonomy is seen immediately.

use crate::backend::{Backend, TaxonomyCheck};
use crate::error::BackendError;
use moka::future::Cache;
use std::time::Duration;

const KEY: &str = "active";

/// Cache of the last positive taxonomy check
#[derive(Debug, Clone)]
pub struct TaxonomyCache {
    inner: Cache<&'static str, TaxonomyCheck>,
}

impl TaxonomyCache {
    /// Create cache with time-based expiration
    #[inline]
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    /// Cached check, or ask the backend
    ///
    /// # Errors
    /// Whatever the backend call returns
    pub async fn get_or_fetch(&self, backend: &dyn Backend) -> Result<TaxonomyCheck, BackendError> {
        if let Some(cached) = self.inner.get(KEY).await {
            return Ok(cached);
        }

        let check = backend.taxonomy_check().await?;
        if check.exists {
            self.inner.insert(KEY, check.clone()).await;
        }
        Ok(check)
    }

    /// Forget the cached answer
    #[inline]
    pub async fn invalidate(&self) {
        self.inner.invalidate(KEY).await;
    }
}
