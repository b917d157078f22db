//! Cache layer
//!
//! Process-local cache for hot reads (category tree, content pages, deck
//! statistics, daily review summaries). Values are stored as JSON so any
//! serializable type can be cached, and every entry carries its own TTL.
//!
//! # Usage
//!
//! ```rust,ignore
//! use medstudy::cache::{create_cache, CacheLayer};
//! use medstudy::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default()).await?;
//! cache.set("key", &"value", Duration::from_secs(60)).await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Cache layer trait
///
/// The generic methods make this trait non object-safe; services hold the
/// concrete [`Cache`] type instead of `dyn CacheLayer`.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all values matching a glob pattern
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<()>;
}

/// Cache implementation shared by the services
pub type Cache = MemoryCache;

/// Create the application cache from configuration
pub async fn create_cache(config: &CacheConfig) -> Result<Arc<Cache>> {
    let ttl = Duration::from_secs(config.ttl_seconds);
    let cache = MemoryCache::with_capacity_and_ttl(config.max_capacity, ttl);
    tracing::info!(
        "Memory cache ready (capacity {}, default ttl {}s)",
        config.max_capacity,
        config.ttl_seconds
    );
    Ok(Arc::new(cache))
}
