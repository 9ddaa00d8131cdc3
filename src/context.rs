//! Build context access
//!
//! A build context is a read-only source tree. deplayer only ever looks
//! files up by name, reads descriptor content for fingerprinting, and
//! copies descriptors into the staging directory.

use crate::descriptor::Descriptor;
use crate::error::{DeplayerError, DeplayerResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Read-only file lookup over a source tree
#[async_trait]
pub trait BuildContext: Send + Sync {
    /// Read a file by its context-relative name
    async fn get_file(&self, name: &str) -> DeplayerResult<Vec<u8>>;

    /// Whether the context contains a file with this name
    async fn contains(&self, name: &str) -> bool;
}

/// Build context backed by a directory on disk
#[derive(Debug, Clone)]
pub struct DirectoryContext {
    root: PathBuf,
}

impl DirectoryContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BuildContext for DirectoryContext {
    async fn get_file(&self, name: &str) -> DeplayerResult<Vec<u8>> {
        let path = self.root.join(name);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DeplayerError::DescriptorNotFound(name.to_string()))
            }
            Err(e) => Err(DeplayerError::io(format!("reading {}", path.display()), e)),
        }
    }

    async fn contains(&self, name: &str) -> bool {
        fs::metadata(self.root.join(name))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }
}

/// Canonical descriptor content used for fingerprinting.
///
/// File contents are concatenated in the caller's order. A package scope,
/// when present, is appended on its own line.
pub async fn descriptor_contents(
    ctx: Option<&dyn BuildContext>,
    descriptor: &Descriptor,
) -> DeplayerResult<String> {
    let mut contents = String::new();

    if let Some(ctx) = ctx {
        for name in descriptor.files() {
            let bytes = ctx.get_file(name).await?;
            let text = String::from_utf8(bytes).map_err(|e| DeplayerError::ManifestInvalid {
                path: name.clone(),
                reason: format!("not valid UTF-8: {}", e),
            })?;
            contents.push_str(&text);
        }
    }

    if let Some(package) = descriptor.package() {
        contents.push('\n');
        contents.push_str(&package.to_string());
    }

    Ok(contents)
}

/// Copy each descriptor file from the context into `dest`, keeping its
/// context-relative path.
pub async fn copy_descriptors(
    ctx: &dyn BuildContext,
    descriptor: &Descriptor,
    dest: &Path,
) -> DeplayerResult<()> {
    for name in descriptor.files() {
        let bytes = ctx.get_file(name).await?;
        let target = dest.join(name);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                DeplayerError::io(format!("creating {}", parent.display()), e)
            })?;
        }

        fs::write(&target, &bytes)
            .await
            .map_err(|e| DeplayerError::io(format!("copying {}", name), e))?;
        debug!("Copied descriptor {} -> {}", name, target.display());
    }
    Ok(())
}
