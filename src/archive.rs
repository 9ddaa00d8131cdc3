//! Layer packaging
//!
//! Turns a staged directory into a `BlobPair` by running `tar` and then
//! `gzip` at a fast compression level. The uncompressed tar is read
//! before gzip replaces it, so the pair always round-trips.

use crate::config::schema::ArchiveConfig;
use crate::error::{DeplayerError, DeplayerResult};
use crate::image::BlobPair;
use crate::process::{run_command, CommandSpec};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Packages a directory tree into a layer blob pair
#[async_trait]
pub trait Archiver: Send + Sync {
    async fn package(&self, dir: &Path) -> DeplayerResult<BlobPair>;
}

/// Archiver using the system `tar` and `gzip`
#[derive(Debug, Clone)]
pub struct TarGzipArchiver {
    tar_program: String,
    gzip_program: String,
    level: u32,
    scratch_dir: PathBuf,
}

impl TarGzipArchiver {
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            tar_program: config.tar_program.clone(),
            gzip_program: config.gzip_program.clone(),
            level: config.compression_level.clamp(1, 9),
            scratch_dir: config
                .scratch_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
        }
    }

    async fn run(&self, dir: &Path, tar_path: &Path) -> DeplayerResult<BlobPair> {
        let tar_str = tar_path.display().to_string();

        let tar = CommandSpec::new("tar_dependencies", &self.tar_program).args([
            "-cf".to_string(),
            tar_str.clone(),
            dir.display().to_string(),
        ]);
        run_command(&tar).await?;

        let uncompressed = fs::read(tar_path)
            .await
            .map_err(|e| DeplayerError::archive("read tar", e))?;

        // -n keeps name and mtime out of the gzip header
        let gzip = CommandSpec::new("gzip_dependencies", &self.gzip_program).args([
            "-n".to_string(),
            format!("-{}", self.level),
            tar_str,
        ]);
        run_command(&gzip).await?;

        let compressed = fs::read(gz_path(tar_path))
            .await
            .map_err(|e| DeplayerError::archive("read gzip", e))?;

        debug!(
            "Packaged {}: {} bytes uncompressed, {} bytes compressed",
            dir.display(),
            uncompressed.len(),
            compressed.len()
        );
        Ok(BlobPair::new(compressed, uncompressed))
    }
}

impl Default for TarGzipArchiver {
    fn default() -> Self {
        Self::new(&ArchiveConfig::default())
    }
}

fn gz_path(tar_path: &Path) -> PathBuf {
    let mut name = tar_path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}

#[async_trait]
impl Archiver for TarGzipArchiver {
    async fn package(&self, dir: &Path) -> DeplayerResult<BlobPair> {
        fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(|e| DeplayerError::io("creating archive scratch dir", e))?;
        let tar_path = self
            .scratch_dir
            .join(format!("deplayer-{}.tar", uuid::Uuid::new_v4()));

        let result = self.run(dir, &tar_path).await;

        // Best-effort scratch cleanup
        let _ = fs::remove_file(&tar_path).await;
        let _ = fs::remove_file(gz_path(&tar_path)).await;

        result
    }
}
