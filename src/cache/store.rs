//! Cache store abstraction
//!
//! Stores map a cache key to a previously built `LayerImage`. Stores must
//! tolerate concurrent `get`/`set` from independent builders; writing the
//! same key twice is idempotent since keys are content-addressed.

use crate::error::DeplayerResult;
use crate::image::LayerImage;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Persistent mapping from cache key to layer image
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a cached image. `Ok(None)` is a miss.
    async fn get(&self, key: &str) -> DeplayerResult<Option<LayerImage>>;

    /// Store an image under `key`
    async fn set(&self, key: &str, image: &LayerImage) -> DeplayerResult<()>;
}

/// In-process cache store
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, LayerImage>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> DeplayerResult<Option<LayerImage>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, image: &LayerImage) -> DeplayerResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), image.clone());
        Ok(())
    }
}
