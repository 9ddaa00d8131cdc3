//! Content-addressed layer cache
//!
//! Layers are keyed by a SHA256 over the descriptor content and the
//! destination path. Same descriptor + same destination = same layer.
//!
//! # Failure policy
//!
//! | Operation | On failure |
//! |-----------|------------|
//! | get | treated as a miss, build proceeds |
//! | set | logged, built image is still returned |

pub mod key;
pub mod local;
pub mod store;

pub use key::{compute_key, compute_raw_key, hash_key, raw_cache_key};
pub use local::{format_bytes, CacheEntry, LocalCacheStore};
pub use store::{CacheStore, MemoryCacheStore};
