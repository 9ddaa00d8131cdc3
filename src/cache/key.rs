//! Content-addressed cache keys
//!
//! The raw key is the byte length of the descriptor content, the content
//! itself, then the destination path after a single space. The length
//! prefix pins the boundary, so no content/destination split can collide
//! with another. The cache key is the SHA256 of the raw key. Nothing
//! else (mtimes, permissions, environment) feeds the hash, so the same
//! descriptor installed to the same path always maps to the same layer.

use crate::context::{descriptor_contents, BuildContext};
use crate::descriptor::Descriptor;
use crate::error::DeplayerResult;
use sha2::{Digest, Sha256};

/// Combine descriptor content and destination path into the raw key
pub fn raw_cache_key(descriptor_contents: &str, destination_path: &str) -> String {
    format!(
        "{}:{} {}",
        descriptor_contents.len(),
        descriptor_contents,
        destination_path
    )
}

/// Hash a raw key into the lowercase hex cache key
pub fn hash_key(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Read the descriptor from the context and compute its raw key
pub async fn compute_raw_key(
    ctx: Option<&dyn BuildContext>,
    descriptor: &Descriptor,
    destination_path: &str,
) -> DeplayerResult<String> {
    let contents = descriptor_contents(ctx, descriptor).await?;
    Ok(raw_cache_key(&contents, destination_path))
}

/// Compute the cache key for a descriptor installed at `destination_path`
pub async fn compute_key(
    ctx: Option<&dyn BuildContext>,
    descriptor: &Descriptor,
    destination_path: &str,
) -> DeplayerResult<String> {
    let raw = compute_raw_key(ctx, descriptor, destination_path).await?;
    Ok(hash_key(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DirectoryContext;
    use crate::descriptor::PackageSpec;
    use std::fs;
    use tempfile::TempDir;

    fn npm_context(package_json: &str) -> (TempDir, DirectoryContext) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("package.json"), package_json).unwrap();
        let ctx = DirectoryContext::new(dir.path());
        (dir, ctx)
    }

    fn package_json() -> Descriptor {
        Descriptor::new(vec!["package.json".to_string()]).unwrap()
    }

    #[test]
    fn raw_key_format() {
        assert_eq!(raw_cache_key("{}", "/srv"), "2:{} /srv");
    }

    #[test]
    fn raw_key_boundary_is_unambiguous() {
        assert_ne!(raw_cache_key("X", "/a b"), raw_cache_key("X /a", "b"));
        assert_ne!(
            hash_key(&raw_cache_key("X", "/a b")),
            hash_key(&raw_cache_key("X /a", "b"))
        );
    }

    #[test]
    fn hash_key_is_hex_sha256() {
        let key = hash_key("{} /srv");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn key_deterministic() {
        let (_dir, ctx) = npm_context(r#"{"dependencies":{"left-pad":"1.0.0"}}"#);

        let key1 = compute_key(Some(&ctx), &package_json(), "/srv").await.unwrap();
        let key2 = compute_key(Some(&ctx), &package_json(), "/srv").await.unwrap();

        assert_eq!(key1, key2);
    }

    #[tokio::test]
    async fn key_ignores_mtime() {
        let (dir, ctx) = npm_context(r#"{"dependencies":{}}"#);
        let before = compute_key(Some(&ctx), &package_json(), "/srv").await.unwrap();

        // Rewrite identical content; mtime changes, key must not
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(dir.path().join("package.json"), r#"{"dependencies":{}}"#).unwrap();

        let after = compute_key(Some(&ctx), &package_json(), "/srv").await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn key_differs_by_destination() {
        let (_dir, ctx) = npm_context("{}");

        let srv = compute_key(Some(&ctx), &package_json(), "/srv").await.unwrap();
        let app = compute_key(Some(&ctx), &package_json(), "/app").await.unwrap();

        assert_ne!(srv, app);
    }

    #[tokio::test]
    async fn key_differs_by_content() {
        let (_a, ctx_a) = npm_context(r#"{"dependencies":{"left-pad":"1.0.0"}}"#);
        let (_b, ctx_b) = npm_context(r#"{"dependencies":{"left-pad":"1.1.0"}}"#);

        let a = compute_key(Some(&ctx_a), &package_json(), "/srv").await.unwrap();
        let b = compute_key(Some(&ctx_b), &package_json(), "/srv").await.unwrap();

        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn key_differs_by_package_scope() {
        let left_pad = package_json().with_package(PackageSpec::new("left-pad", "1.0.0"));
        let right_pad = package_json().with_package(PackageSpec::new("right-pad", "1.0.0"));

        let a = compute_key(None, &left_pad, "/srv").await.unwrap();
        let b = compute_key(None, &right_pad, "/srv").await.unwrap();

        assert_ne!(a, b);
    }
}
