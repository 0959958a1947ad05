//! Illustrative image lookup
//!
//! The classifier only knows the [`ImageLookup`] seam. Implementations:
//! - [`NoImages`]: lookups disabled (no credential configured)
//! - [`crate::unsplash::UnsplashLookup`]: random photo by query
//! - [`CachedLookup`]: query-keyed TTL cache around any other lookup

use async_trait::async_trait;
use insight_core::{attr, Attributes};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A chosen image and its attribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    pub user: Option<String>,
    pub user_link: Option<String>,
}

impl ImageRef {
    /// Image without attribution (placeholder)
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: None,
            user_link: None,
        }
    }

    #[must_use]
    pub fn with_credit(mut self, user: impl Into<String>, link: impl Into<String>) -> Self {
        self.user = Some(user.into()).filter(|u: &String| !u.is_empty());
        self.user_link = Some(link.into()).filter(|l: &String| !l.is_empty());
        self
    }

    /// Write `imageUrl` and attribution into card attributes, clearing stale credit.
    pub fn apply_to(&self, attributes: &mut Attributes) {
        attributes.insert(attr::IMAGE_URL, self.url.clone());
        match &self.user {
            Some(user) => attributes.insert(attr::IMAGE_USER, user.clone()),
            None => {
                attributes.remove(attr::IMAGE_USER);
            }
        }
        match &self.user_link {
            Some(link) => attributes.insert(attr::IMAGE_USER_LINK, link.clone()),
            None => {
                attributes.remove(attr::IMAGE_USER_LINK);
            }
        }
    }
}

/// Image lookup errors
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// Transport failure
    #[error("image request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Unexpected response status
    #[error("image service returned status {0}")]
    Status(u16),
}

/// Source of illustrative images
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageLookup: Send + Sync {
    /// Find one image for a free-text query; `Ok(None)` when nothing matched.
    async fn lookup(&self, query: &str) -> Result<Option<ImageRef>, ImageError>;
}

/// Lookup that never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImages;

#[async_trait]
impl ImageLookup for NoImages {
    async fn lookup(&self, _query: &str) -> Result<Option<ImageRef>, ImageError> {
        Ok(None)
    }
}

/// Query-keyed cache in front of another lookup
///
/// Answers (including "nothing found") are cached for the TTL; errors are not.
pub struct CachedLookup<L> {
    inner: L,
    cache: Cache<String, Option<ImageRef>>,
}

impl<L: ImageLookup> CachedLookup<L> {
    #[must_use]
    pub fn new(inner: L, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Get approximate entry count
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl<L> fmt::Debug for CachedLookup<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedLookup")
            .field("entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<L: ImageLookup> ImageLookup for CachedLookup<L> {
    async fn lookup(&self, query: &str) -> Result<Option<ImageRef>, ImageError> {
        let key = query.trim().to_lowercase();
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(query, "image cache hit");
            return Ok(hit);
        }
        let found = self.inner.lookup(query).await?;
        self.cache.insert(key, found.clone()).await;
        Ok(found)
    }
}

#[async_trait]
impl<L: ImageLookup + ?Sized> ImageLookup for Arc<L> {
    async fn lookup(&self, query: &str) -> Result<Option<ImageRef>, ImageError> {
        (**self).lookup(query).await
    }
}
