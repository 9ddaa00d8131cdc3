//! Dependency installation
//!
//! The package manager is an injected `Installer` so staging logic can be
//! exercised without a real package manager. `NpmInstaller` shells out
//! to npm; `StagingInstaller` owns the staging sequence.

mod npm;
mod staging;

pub use npm::NpmInstaller;
pub use staging::{create_staging_dir, DirCreation, StagedDirectory, StagingInstaller};

use crate::descriptor::PackageSpec;
use crate::error::DeplayerResult;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;

/// What an install invocation should produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallMode {
    /// Full production dependency tree from the manifest
    Production,
    /// A single package added on top of whatever is present
    Package(PackageSpec),
    /// Full tree including development dependencies, for the build hook
    Development,
}

impl fmt::Display for InstallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Package(spec) => write!(f, "production {}", spec),
            Self::Development => write!(f, "development"),
        }
    }
}

/// External package manager
///
/// Failures of either operation are user errors: the manifest, the
/// network as reported by the installer, or the user's script is at fault.
#[async_trait]
pub trait Installer: Send + Sync {
    /// Install dependencies into `dir`
    async fn install(&self, dir: &Path, mode: &InstallMode) -> DeplayerResult<()>;

    /// Run a named manifest script in development mode
    async fn run_script(&self, dir: &Path, script: &str) -> DeplayerResult<()>;

    /// Human-readable installer name for logs
    fn name(&self) -> &'static str;
}
