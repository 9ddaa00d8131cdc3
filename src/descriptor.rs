//! Dependency descriptors
//!
//! A descriptor is the ordered list of manifest files that define a
//! dependency tree, plus an optional single-package scope. The primary
//! manifest is parsed only to discover the optional build hook.

use crate::error::{DeplayerError, DeplayerResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

/// An explicit package name/version pair scoping a single-package build
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageSpec {
    pub name: String,
    pub version: String,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

impl FromStr for PackageSpec {
    type Err = DeplayerError;

    /// Parse `name@version`, including scoped names such as `@types/node@20.1.0`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DeplayerError::PackageSpecInvalid(s.to_string());

        // Skip a leading '@' so the scope marker isn't taken as the separator
        let search_from = usize::from(s.starts_with('@'));
        let at = s[search_from..]
            .rfind('@')
            .map(|i| i + search_from)
            .ok_or_else(invalid)?;

        let (name, version) = (&s[..at], &s[at + 1..]);
        if name.is_empty() || version.is_empty() || name.ends_with('/') {
            return Err(invalid());
        }

        Ok(Self::new(name, version))
    }
}

/// Manifest files plus optional package scope. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
    files: Vec<String>,
    package: Option<PackageSpec>,
}

impl Descriptor {
    /// Create a descriptor for a whole dependency tree
    pub fn new(files: Vec<String>) -> DeplayerResult<Self> {
        for file in &files {
            validate_descriptor_path(file)?;
        }
        Ok(Self {
            files,
            package: None,
        })
    }

    /// Scope the descriptor to a single package
    pub fn with_package(mut self, package: PackageSpec) -> Self {
        self.package = Some(package);
        self
    }

    /// Manifest files in caller order
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn package(&self) -> Option<&PackageSpec> {
        self.package.as_ref()
    }
}

/// Validate that a descriptor path stays inside the build context.
fn validate_descriptor_path(path: &str) -> DeplayerResult<()> {
    let invalid = |reason: &str| DeplayerError::DescriptorPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if path.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if path.contains('\0') {
        return Err(invalid("must not contain NUL"));
    }
    for component in Path::new(path).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err(invalid("must not contain '..'")),
            _ => return Err(invalid("must be relative to the build context")),
        }
    }
    Ok(())
}

/// The parts of a package manifest deplayer cares about
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,

    /// Named scripts (`npm run-script <name>`)
    #[serde(default)]
    pub scripts: HashMap<String, String>,
}

impl PackageManifest {
    /// Parse a manifest from JSON bytes
    pub fn parse(path: &str, content: &[u8]) -> DeplayerResult<Self> {
        serde_json::from_slice(content).map_err(|e| DeplayerError::ManifestInvalid {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// The declared build hook, if its script entry is present and non-empty
    pub fn build_hook(&self, hook: &str) -> Option<&str> {
        self.scripts
            .get(hook)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WITH_HOOK: &str = r#"{
        "name": "app",
        "dependencies": { "left-pad": "1.0.0" },
        "devDependencies": { "typescript": "^5.0.0" },
        "scripts": { "gcp-build": "tsc -p .", "start": "node dist/index.js" }
    }"#;

    #[test]
    fn parse_plain_package_spec() {
        let spec: PackageSpec = "left-pad@1.0.0".parse().unwrap();
        assert_eq!(spec, PackageSpec::new("left-pad", "1.0.0"));
        assert_eq!(spec.to_string(), "left-pad@1.0.0");
    }

    #[test]
    fn parse_scoped_package_spec() {
        let spec: PackageSpec = "@types/node@20.1.0".parse().unwrap();
        assert_eq!(spec.name, "@types/node");
        assert_eq!(spec.version, "20.1.0");
    }

    #[test]
    fn reject_malformed_package_spec() {
        for bad in ["left-pad", "left-pad@", "@1.0.0", "@types/node", "@types/@1"] {
            assert!(bad.parse::<PackageSpec>().is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn descriptor_preserves_order() {
        let descriptor = Descriptor::new(vec![
            "package.json".to_string(),
            "package-lock.json".to_string(),
        ])
        .unwrap();
        assert_eq!(descriptor.files(), ["package.json", "package-lock.json"]);
        assert!(descriptor.package().is_none());
    }

    #[test]
    fn descriptor_rejects_escaping_paths() {
        assert!(Descriptor::new(vec!["../package.json".to_string()]).is_err());
        assert!(Descriptor::new(vec!["/etc/passwd".to_string()]).is_err());
        assert!(Descriptor::new(vec![String::new()]).is_err());
        assert!(Descriptor::new(vec!["sub/package.json".to_string()]).is_ok());
    }

    #[test]
    fn manifest_build_hook_present() {
        let manifest = PackageManifest::parse("package.json", WITH_HOOK.as_bytes()).unwrap();
        assert_eq!(manifest.name.as_deref(), Some("app"));
        assert_eq!(manifest.build_hook("gcp-build"), Some("tsc -p ."));
    }

    #[test]
    fn manifest_without_scripts() {
        let manifest =
            PackageManifest::parse("package.json", br#"{"dependencies":{}}"#).unwrap();
        assert!(manifest.build_hook("gcp-build").is_none());
    }

    #[test]
    fn manifest_empty_hook_is_ignored() {
        let manifest =
            PackageManifest::parse("package.json", br#"{"scripts":{"gcp-build":""}}"#).unwrap();
        assert!(manifest.build_hook("gcp-build").is_none());
    }

    #[test]
    fn invalid_manifest_is_user_error() {
        let err = PackageManifest::parse("package.json", b"{not json").unwrap_err();
        assert!(err.is_user_error());
    }
}
