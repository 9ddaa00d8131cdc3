//! Cache telemetry
//!
//! Every cache lookup emits one `CacheEvent`. Whole-tree builds
//! ("phase 1") and single-package builds ("phase 2") are reported
//! separately so hit rates can be tracked per build type.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Which kind of build looked up the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum BuildPhase {
    /// Whole dependency tree from the manifest
    WholeTree,
    /// One explicitly scoped package
    SinglePackage {
        package_name: String,
        package_version: String,
    },
}

impl BuildPhase {
    pub fn number(&self) -> u8 {
        match self {
            Self::WholeTree => 1,
            Self::SinglePackage { .. } => 2,
        }
    }
}

/// Result of one cache lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEvent {
    pub hit: bool,
    #[serde(flatten)]
    pub phase: BuildPhase,
    pub key_version: String,
    pub language: String,
    pub key: String,
}

impl fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = if self.hit { "HIT" } else { "MISS" };
        write!(
            f,
            "[CACHE][PHASE {}][{}] {}:{}",
            self.phase.number(),
            result,
            self.key_version,
            self.language
        )?;
        if let BuildPhase::SinglePackage {
            package_name,
            package_version,
        } = &self.phase
        {
            write!(f, " {}@{}", package_name, package_version)?;
        }
        write!(f, " -> {}", self.key)
    }
}

/// Receives cache events. Sinks must never fail the build.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record(&self, event: &CacheEvent);
}

/// Sink that emits structured `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl EventSink for TracingSink {
    async fn record(&self, event: &CacheEvent) {
        info!(
            hit = event.hit,
            phase = event.phase.number(),
            key_version = %event.key_version,
            key = %event.key,
            "{}",
            event
        );
    }
}

/// File-based event log that appends JSON lines
pub struct EventLog {
    enabled: bool,
    path: PathBuf,
}

impl EventLog {
    pub fn new(enabled: bool, path: PathBuf) -> Self {
        Self { enabled, path }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl EventSink for EventLog {
    /// Silently drops events on IO failure
    async fn record(&self, event: &CacheEvent) {
        TracingSink.record(event).await;
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": if event.hit { "cache.hit" } else { "cache.miss" },
            "data": event,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize cache event: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write event log: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn phase2_hit() -> CacheEvent {
        CacheEvent {
            hit: true,
            phase: BuildPhase::SinglePackage {
                package_name: "left-pad".to_string(),
                package_version: "1.0.0".to_string(),
            },
            key_version: "v1".to_string(),
            language: "NODE".to_string(),
            key: "abc123".to_string(),
        }
    }

    fn phase1_miss() -> CacheEvent {
        CacheEvent {
            hit: false,
            phase: BuildPhase::WholeTree,
            key_version: "v1".to_string(),
            language: "NODE".to_string(),
            key: "def456".to_string(),
        }
    }

    #[test]
    fn display_distinguishes_phases() {
        assert_eq!(
            phase1_miss().to_string(),
            "[CACHE][PHASE 1][MISS] v1:NODE -> def456"
        );
        assert_eq!(
            phase2_hit().to_string(),
            "[CACHE][PHASE 2][HIT] v1:NODE left-pad@1.0.0 -> abc123"
        );
    }

    #[tokio::test]
    async fn writes_json_line() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(true, dir.path().join("events.log"));

        log.record(&phase2_hit()).await;

        let content = tokio::fs::read_to_string(&log.path).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();

        assert_eq!(parsed["event"], "cache.hit");
        assert_eq!(parsed["data"]["phase"], "single_package");
        assert_eq!(parsed["data"]["package_name"], "left-pad");
        assert_eq!(parsed["data"]["key_version"], "v1");
        assert!(parsed["timestamp"].is_string());
    }

    #[tokio::test]
    async fn appends_multiple_lines() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(true, dir.path().join("nested").join("events.log"));

        log.record(&phase1_miss()).await;
        log.record(&phase2_hit()).await;

        let content = tokio::fs::read_to_string(&log.path).await.unwrap();
        assert_eq!(content.trim().lines().count(), 2);
    }

    #[tokio::test]
    async fn skips_when_disabled() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(false, dir.path().join("events.log"));

        log.record(&phase1_miss()).await;

        assert!(!log.path.exists());
    }
}
