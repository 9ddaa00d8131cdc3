//! Error types for deplayer
//!
//! All modules use `DeplayerResult<T>` as their return type. Every error
//! is classified as either a user error (the manifest, the package scope
//! or the installer/build hook is at fault) or an internal error.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for deplayer operations
pub type DeplayerResult<T> = Result<T, DeplayerError>;

/// Who is responsible for a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Descriptor content, package scope, installer or build hook
    User,
    /// Filesystem, archive tooling, cache I/O or configuration
    Internal,
}

/// All errors that can occur in deplayer
#[derive(Error, Debug)]
pub enum DeplayerError {
    // Descriptor errors
    #[error("Descriptor file not found in build context: {0}")]
    DescriptorNotFound(String),

    #[error("Invalid descriptor path '{path}': {reason}")]
    DescriptorPath { path: String, reason: String },

    #[error("Invalid manifest {path}: {reason}")]
    ManifestInvalid { path: String, reason: String },

    #[error("Invalid package scope '{0}': expected NAME@VERSION")]
    PackageSpecInvalid(String),

    // Install errors
    #[error("{step} failed: {command}\n{output}")]
    Install {
        step: String,
        command: String,
        output: String,
    },

    // Staging errors
    #[error("Failed to create staging directory {path}: {source}")]
    StagingDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Staging path {0} exists and is not a directory")]
    StagingNotDir(PathBuf),

    // Packaging errors
    #[error("Layer packaging failed at {step}: {reason}")]
    Archive { step: String, reason: String },

    #[error("Cannot assemble an image without layers")]
    EmptyImage,

    // Cache errors
    #[error("Cache entry {key} is corrupt: {reason}")]
    CacheCorrupt { key: String, reason: String },

    #[error("Cache entry not found: {0}")]
    CacheEntryNotFound(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed to start: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, output: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl DeplayerError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Create an archive error for a packaging step
    pub fn archive(step: impl Into<String>, reason: impl ToString) -> Self {
        Self::Archive {
            step: step.into(),
            reason: reason.to_string(),
        }
    }

    /// Classify the error as user-caused or internal
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DescriptorNotFound(_)
            | Self::DescriptorPath { .. }
            | Self::ManifestInvalid { .. }
            | Self::PackageSpecInvalid(_)
            | Self::Install { .. }
            | Self::User(_) => ErrorKind::User,
            _ => ErrorKind::Internal,
        }
    }

    /// Whether the error should be surfaced to the end user as their fault
    pub fn is_user_error(&self) -> bool {
        self.kind() == ErrorKind::User
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::DescriptorNotFound(_) => Some("Check the --descriptor paths against --context"),
            Self::PackageSpecInvalid(_) => Some("Use the form name@version, e.g. left-pad@1.0.0"),
            Self::Install { .. } => Some("Run the install locally to reproduce the failure"),
            Self::CacheCorrupt { .. } => Some("Run: deplayer cache clear --yes"),
            Self::CommandFailed { .. } => Some("Ensure npm, tar and gzip are on PATH"),
            _ => None,
        }
    }
}
