//! Filesystem cache store
//!
//! Each cache key owns a directory holding `image.json` plus one
//! `layer-N.tar.gz` / `layer-N.tar` pair per layer. Entries are written
//! into a unique scratch directory and renamed into place, so readers
//! never observe a half-written entry and racing writers of the same key
//! leave exactly one complete copy behind.

use crate::cache::store::CacheStore;
use crate::error::{DeplayerError, DeplayerResult};
use crate::image::{BlobPair, LayerDescriptor, LayerImage, Overrides};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

const RECORD_FILE: &str = "image.json";
const SCRATCH_PREFIX: &str = ".tmp-";

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// On-disk record describing a cached image
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheRecord {
    key: String,
    stored_at: DateTime<Utc>,
    overrides: Overrides,
    layers: Vec<LayerDescriptor>,
}

/// Summary of a cache entry for listing and gc
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub key: String,
    pub stored_at: DateTime<Utc>,
    pub created: String,
    pub layers: usize,
    pub size_bytes: u64,
}

impl CacheEntry {
    /// Check if this entry is older than the given number of days
    pub fn is_older_than_days(&self, days: u32) -> bool {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        self.stored_at < cutoff
    }
}

/// Cache store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalCacheStore {
    root: PathBuf,
}

impl LocalCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, key: &str) -> DeplayerResult<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DeplayerError::CacheEntryNotFound(key.to_string()));
        }
        Ok(self.root.join(key))
    }

    fn compressed_name(index: usize) -> String {
        format!("layer-{}.tar.gz", index)
    }

    fn uncompressed_name(index: usize) -> String {
        format!("layer-{}.tar", index)
    }

    async fn read_record(dir: &Path) -> DeplayerResult<Option<CacheRecord>> {
        let path = dir.join(RECORD_FILE);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DeplayerError::io(format!("reading {}", path.display()), e)),
        }
    }

    async fn read_blob(path: &Path) -> DeplayerResult<Vec<u8>> {
        fs::read(path)
            .await
            .map_err(|e| DeplayerError::io(format!("reading {}", path.display()), e))
    }

    async fn write_entry(dir: &Path, record: &CacheRecord, image: &LayerImage) -> DeplayerResult<()> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| DeplayerError::io(format!("creating {}", dir.display()), e))?;

        for (index, layer) in image.layers().iter().enumerate() {
            let gz = dir.join(Self::compressed_name(index));
            fs::write(&gz, &layer.compressed)
                .await
                .map_err(|e| DeplayerError::io(format!("writing {}", gz.display()), e))?;

            let tar = dir.join(Self::uncompressed_name(index));
            fs::write(&tar, &layer.uncompressed)
                .await
                .map_err(|e| DeplayerError::io(format!("writing {}", tar.display()), e))?;
        }

        // Record last: its presence marks the entry complete
        let json = serde_json::to_vec_pretty(record)?;
        fs::write(dir.join(RECORD_FILE), json)
            .await
            .map_err(|e| DeplayerError::io("writing cache record", e))
    }

    async fn dir_size(dir: &Path) -> u64 {
        let mut total = 0;
        if let Ok(mut entries) = fs::read_dir(dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if let Ok(meta) = entry.metadata().await {
                    total += meta.len();
                }
            }
        }
        total
    }

    /// List all complete cache entries
    pub async fn list(&self) -> DeplayerResult<Vec<CacheEntry>> {
        let mut entries = Vec::new();

        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => {
                return Err(DeplayerError::io(
                    format!("listing {}", self.root.display()),
                    e,
                ))
            }
        };

        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| DeplayerError::io("reading cache directory", e))?
        {
            let name = item.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }

            let path = item.path();
            match Self::read_record(&path).await {
                Ok(Some(record)) => entries.push(CacheEntry {
                    key: record.key,
                    stored_at: record.stored_at,
                    created: record.overrides.created,
                    layers: record.layers.len(),
                    size_bytes: Self::dir_size(&path).await,
                }),
                Ok(None) => debug!("Skipping incomplete cache entry {}", name),
                Err(e) => debug!("Skipping unreadable cache entry {}: {}", name, e),
            }
        }

        entries.sort_by(|a, b| a.stored_at.cmp(&b.stored_at));
        Ok(entries)
    }

    /// Remove a cache entry
    pub async fn remove(&self, key: &str) -> DeplayerResult<()> {
        let dir = self.entry_dir(key)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DeplayerError::CacheEntryNotFound(key.to_string()))
            }
            Err(e) => Err(DeplayerError::io(format!("removing {}", dir.display()), e)),
        }
    }

    /// Entries older than `days`
    pub async fn expired(&self, days: u32) -> DeplayerResult<Vec<CacheEntry>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|entry| entry.is_older_than_days(days))
            .collect())
    }

    /// Remove entries older than `days`, returning what was removed.
    /// Entries already removed by a concurrent gc are skipped.
    pub async fn gc(&self, days: u32) -> DeplayerResult<Vec<CacheEntry>> {
        let mut removed = Vec::new();
        for entry in self.expired(days).await? {
            match self.remove(&entry.key).await {
                Ok(()) => removed.push(entry),
                Err(DeplayerError::CacheEntryNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl CacheStore for LocalCacheStore {
    async fn get(&self, key: &str) -> DeplayerResult<Option<LayerImage>> {
        let dir = self.entry_dir(key)?;
        let Some(record) = Self::read_record(&dir).await? else {
            return Ok(None);
        };

        let corrupt = |reason: String| DeplayerError::CacheCorrupt {
            key: key.to_string(),
            reason,
        };

        if record.key != key {
            return Err(corrupt(format!("record belongs to {}", record.key)));
        }

        let mut layers = Vec::with_capacity(record.layers.len());
        for (index, expected) in record.layers.iter().enumerate() {
            let compressed = Self::read_blob(&dir.join(Self::compressed_name(index))).await?;
            let uncompressed = Self::read_blob(&dir.join(Self::uncompressed_name(index))).await?;
            let pair = BlobPair::new(compressed, uncompressed);

            if pair.digest() != expected.digest || pair.diff_id() != expected.diff_id {
                return Err(corrupt(format!("layer {} digest mismatch", index)));
            }
            layers.push(pair);
        }

        debug!("Loaded cached layer image {}", key);
        LayerImage::assemble(layers, record.overrides).map(Some)
    }

    async fn set(&self, key: &str, image: &LayerImage) -> DeplayerResult<()> {
        let target = self.entry_dir(key)?;
        if fs::try_exists(target.join(RECORD_FILE)).await.unwrap_or(false) {
            match self.get(key).await {
                Ok(Some(_)) => {
                    debug!("Cache entry {} already present", key);
                    return Ok(());
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Replacing unusable cache entry {}: {}", key, e);
                    match fs::remove_dir_all(&target).await {
                        Ok(()) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => {
                            return Err(DeplayerError::io(
                                format!("evicting cache entry {}", key),
                                e,
                            ))
                        }
                    }
                }
            }
        }

        let scratch = self
            .root
            .join(format!("{}{}", SCRATCH_PREFIX, uuid::Uuid::new_v4()));
        let record = CacheRecord {
            key: key.to_string(),
            stored_at: Utc::now(),
            overrides: image.overrides().clone(),
            layers: image.manifest().layers,
        };

        if let Err(e) = Self::write_entry(&scratch, &record, image).await {
            let _ = fs::remove_dir_all(&scratch).await;
            return Err(e);
        }

        // An incomplete directory left by a crashed writer is replaced
        if fs::try_exists(&target).await.unwrap_or(false)
            && !fs::try_exists(target.join(RECORD_FILE)).await.unwrap_or(false)
        {
            let _ = fs::remove_dir_all(&target).await;
        }

        match fs::rename(&scratch, &target).await {
            Ok(()) => {
                debug!("Stored layer image {}", key);
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_dir_all(&scratch).await;
                // Lost a race against another writer of the same key
                if fs::try_exists(target.join(RECORD_FILE)).await.unwrap_or(false) {
                    Ok(())
                } else {
                    Err(DeplayerError::io(format!("storing cache entry {}", key), e))
                }
            }
        }
    }
}
