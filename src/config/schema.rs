//! Configuration schema for deplayer
//!
//! Configuration is stored at `~/.config/deplayer/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Layer build settings
    pub layer: LayerConfig,

    /// Staging directory settings
    pub staging: StagingConfig,

    /// External installer settings
    pub installer: InstallerConfig,

    /// Archive/compression tooling settings
    pub archive: ArchiveConfig,

    /// Cache settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Append cache events to the event log file
    pub event_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            event_log: false,
        }
    }
}

/// Layer build settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Directory the dependency tree is installed into (and archived from)
    pub destination_path: String,

    /// Language tag reported in cache events
    pub language: String,

    /// Key format version reported in cache events
    pub cache_key_version: String,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            destination_path: "/srv".to_string(),
            language: "NODE".to_string(),
            cache_key_version: "v2".to_string(),
        }
    }
}

/// Staging directory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Manifest consulted for the build hook
    pub primary_manifest: String,

    /// Transitive dependency subtree removed before every install
    pub dependency_dir: String,

    /// Script name that, when declared, runs after a development install
    pub build_hook: String,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            primary_manifest: "package.json".to_string(),
            dependency_dir: "node_modules".to_string(),
            build_hook: "gcp-build".to_string(),
        }
    }
}

/// External installer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Installer program
    pub program: String,

    /// Environment variable marking a development-mode install
    pub dev_env_var: String,

    /// Value of the development-mode marker
    pub dev_env_value: String,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            program: "npm".to_string(),
            dev_env_var: "NODE_ENV".to_string(),
            dev_env_value: "development".to_string(),
        }
    }
}

/// Archive tooling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// tar program
    pub tar_program: String,

    /// gzip program
    pub gzip_program: String,

    /// gzip compression level (1 = fastest)
    pub compression_level: u32,

    /// Directory for scratch archives (defaults to the system temp dir)
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            tar_program: "tar".to_string(),
            gzip_program: "gzip".to_string(),
            compression_level: 1,
            scratch_dir: None,
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable layer caching (default: true)
    pub enabled: bool,

    /// Cache directory (defaults to `~/.cache/deplayer/layers`)
    pub dir: Option<PathBuf>,

    /// Remove cached layers older than N days on gc (0 = disabled)
    pub gc_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            gc_days: 30,
        }
    }
}
