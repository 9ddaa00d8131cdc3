//! Cacheable layer builders
//!
//! A builder turns a descriptor into one `LayerImage`, reusing a cached
//! image when the content-derived key is already known.
//!
//! # Lifecycle
//!
//! | State | Meaning |
//! |-------|---------|
//! | Initialized | inputs bound, nothing done |
//! | CacheChecked | cache queried once (or no cache configured) |
//! | Reusing | cached image adopted |
//! | Building | install, package and assemble running |
//! | Done | image available, further builds are no-ops |

mod package;

pub use package::PackageLayerBuilder;

use crate::cache::hash_key;
use crate::error::{DeplayerError, DeplayerResult};
use crate::image::LayerImage;
use async_trait::async_trait;
use std::fmt;
use tokio::sync::OnceCell;
use tracing::debug;

/// Builder lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Initialized,
    CacheChecked,
    Reusing,
    Building,
    Done,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialized => "initialized",
            Self::CacheChecked => "cache-checked",
            Self::Reusing => "reusing",
            Self::Building => "building",
            Self::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// How the builder obtained its image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Adopted from the cache store
    Reused,
    /// Installed, packaged and assembled
    Built,
}

/// State shared by every builder: memoized key, result image, lifecycle
#[derive(Debug)]
pub struct LayerCore {
    key: OnceCell<String>,
    image: Option<LayerImage>,
    state: BuildState,
    outcome: Option<BuildOutcome>,
}

impl LayerCore {
    pub fn new() -> Self {
        Self {
            key: OnceCell::new(),
            image: None,
            state: BuildState::Initialized,
            outcome: None,
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn outcome(&self) -> Option<BuildOutcome> {
        self.outcome
    }

    pub fn image(&self) -> Option<&LayerImage> {
        self.image.as_ref()
    }

    pub fn take_image(&mut self) -> Option<LayerImage> {
        self.image.take()
    }

    pub(crate) fn transition(&mut self, next: BuildState) {
        debug!("Layer builder {} -> {}", self.state, next);
        self.state = next;
    }

    pub(crate) fn finish(&mut self, image: LayerImage, outcome: BuildOutcome) -> BuildOutcome {
        self.image = Some(image);
        self.outcome = Some(outcome);
        self.transition(BuildState::Done);
        outcome
    }
}

impl Default for LayerCore {
    fn default() -> Self {
        Self::new()
    }
}

/// A layer builder whose result can be cached by content key
#[async_trait]
pub trait CacheableLayerBuilder: Send + Sync {
    fn core(&self) -> &LayerCore;

    fn core_mut(&mut self) -> &mut LayerCore;

    /// Unhashed key material
    async fn compute_raw_cache_key(&self) -> DeplayerResult<String>;

    /// The cache key, computed once per builder
    async fn cache_key(&self) -> DeplayerResult<String> {
        self.core()
            .key
            .get_or_try_init(|| async {
                let raw = self.compute_raw_cache_key().await?;
                Ok::<_, DeplayerError>(hash_key(&raw))
            })
            .await
            .cloned()
    }

    /// Produce the layer image, from cache or by building
    async fn build_layer(&mut self) -> DeplayerResult<BuildOutcome>;

    fn image(&self) -> Option<&LayerImage> {
        self.core().image()
    }

    /// Hand the image to the caller; later calls return `None`
    fn take_image(&mut self) -> Option<LayerImage> {
        self.core_mut().take_image()
    }
}

/// Build each layer in order and stack the results, bottom first
pub async fn build_stacked(
    builders: &mut [Box<dyn CacheableLayerBuilder>],
) -> DeplayerResult<LayerImage> {
    let mut images = Vec::with_capacity(builders.len());
    for builder in builders.iter_mut() {
        builder.build_layer().await?;
        let image = builder
            .take_image()
            .ok_or_else(|| DeplayerError::Internal("layer image already taken".to_string()))?;
        images.push(image);
    }
    LayerImage::stack(images)
}
