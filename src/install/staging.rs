//! Staging directory preparation
//!
//! Sequence for one build:
//! 1. create the destination directory (existing directory is fine)
//! 2. copy descriptor files in from the build context
//! 3. when the primary manifest declares the build hook: development
//!    install, then run the hook
//! 4. remove the dependency subtree left by any earlier install or by
//!    the development install in step 3
//! 5. production install (whole tree, or one package additively)

use super::{InstallMode, Installer};
use crate::config::schema::StagingConfig;
use crate::context::{copy_descriptors, BuildContext};
use crate::descriptor::{Descriptor, PackageManifest};
use crate::error::{DeplayerError, DeplayerResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// Outcome of creating the staging directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirCreation {
    Created,
    AlreadyExisted,
}

/// Create `path` (and parents). An existing directory is an expected
/// outcome; anything else that prevents creation is an internal error.
pub async fn create_staging_dir(path: &Path) -> DeplayerResult<DirCreation> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| DeplayerError::StagingDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }

    match fs::create_dir(path).await {
        Ok(()) => Ok(DirCreation::Created),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            let is_dir = fs::metadata(path)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if is_dir {
                info!("{} already exists, skipping creation", path.display());
                Ok(DirCreation::AlreadyExisted)
            } else {
                Err(DeplayerError::StagingNotDir(path.to_path_buf()))
            }
        }
        Err(e) => Err(DeplayerError::StagingDir {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// A destination directory holding a freshly installed dependency tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedDirectory {
    path: PathBuf,
    /// Whether the build hook ran
    pub hook_ran: bool,
}

impl StagedDirectory {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Runs the staging sequence against an injected installer
#[derive(Clone)]
pub struct StagingInstaller {
    installer: Arc<dyn Installer>,
    config: StagingConfig,
}

impl StagingInstaller {
    pub fn new(installer: Arc<dyn Installer>, config: StagingConfig) -> Self {
        Self { installer, config }
    }

    /// Stage `descriptor` into `dest`
    pub async fn install(
        &self,
        descriptor: &Descriptor,
        dest: &Path,
        ctx: Option<&dyn BuildContext>,
    ) -> DeplayerResult<StagedDirectory> {
        create_staging_dir(dest).await?;

        if let Some(ctx) = ctx.filter(|_| !descriptor.files().is_empty()) {
            copy_descriptors(ctx, descriptor, dest).await?;
        }

        let hook_ran = match ctx {
            Some(ctx) => self.run_build_hook(ctx, dest).await?,
            None => false,
        };

        self.remove_dependency_tree(dest).await?;

        let mode = match descriptor.package() {
            Some(spec) => InstallMode::Package(spec.clone()),
            None => InstallMode::Production,
        };
        info!(
            "Installing {} dependencies with {} into {}",
            mode,
            self.installer.name(),
            dest.display()
        );
        self.installer.install(dest, &mode).await?;

        Ok(StagedDirectory {
            path: dest.to_path_buf(),
            hook_ran,
        })
    }

    /// Run the build hook if the primary manifest declares one.
    async fn run_build_hook(&self, ctx: &dyn BuildContext, dest: &Path) -> DeplayerResult<bool> {
        let manifest_name = &self.config.primary_manifest;
        if !ctx.contains(manifest_name).await {
            debug!("No {} in build context, skipping build hook", manifest_name);
            return Ok(false);
        }

        let manifest = PackageManifest::parse(manifest_name, &ctx.get_file(manifest_name).await?)?;
        let hook = self.config.build_hook.as_str();
        if manifest.build_hook(hook).is_none() {
            return Ok(false);
        }

        info!("Running build hook {}", hook);
        self.installer.install(dest, &InstallMode::Development).await?;
        self.installer.run_script(dest, hook).await?;
        Ok(true)
    }

    /// Remove the dependency subtree under `dest`; a missing tree is fine.
    async fn remove_dependency_tree(&self, dest: &Path) -> DeplayerResult<()> {
        let tree = dest.join(&self.config.dependency_dir);
        match fs::remove_dir_all(&tree).await {
            Ok(()) => {
                debug!("Removed stale {}", tree.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DeplayerError::io(format!("removing {}", tree.display()), e)),
        }
    }
}
