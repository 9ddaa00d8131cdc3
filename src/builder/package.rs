//! Package dependency layer builder

use super::{BuildOutcome, BuildState, CacheableLayerBuilder, LayerCore};
use crate::archive::{Archiver, TarGzipArchiver};
use crate::cache::{compute_raw_key, CacheStore};
use crate::config::schema::{Config, LayerConfig, StagingConfig};
use crate::context::BuildContext;
use crate::descriptor::Descriptor;
use crate::error::DeplayerResult;
use crate::events::{BuildPhase, CacheEvent, EventSink, TracingSink};
use crate::image::{LayerImage, Overrides};
use crate::install::{Installer, NpmInstaller, StagingInstaller};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Builds one layer holding the installed dependencies of a descriptor,
/// either the whole tree or a single scoped package.
pub struct PackageLayerBuilder {
    core: LayerCore,
    ctx: Option<Arc<dyn BuildContext>>,
    descriptor: Descriptor,
    destination: String,
    cache: Option<Arc<dyn CacheStore>>,
    installer: Arc<dyn Installer>,
    archiver: Arc<dyn Archiver>,
    events: Arc<dyn EventSink>,
    staging: StagingConfig,
    layer: LayerConfig,
    build_date: Option<NaiveDate>,
}

impl PackageLayerBuilder {
    pub fn new(
        descriptor: Descriptor,
        destination: impl Into<String>,
        installer: Arc<dyn Installer>,
        archiver: Arc<dyn Archiver>,
    ) -> Self {
        Self {
            core: LayerCore::new(),
            ctx: None,
            descriptor,
            destination: destination.into(),
            cache: None,
            installer,
            archiver,
            events: Arc::new(TracingSink),
            staging: StagingConfig::default(),
            layer: LayerConfig::default(),
            build_date: None,
        }
    }

    /// Builder wired to npm, tar and gzip as configured
    pub fn from_config(config: &Config, descriptor: Descriptor) -> Self {
        Self::new(
            descriptor,
            config.layer.destination_path.clone(),
            Arc::new(NpmInstaller::new(&config.installer)),
            Arc::new(TarGzipArchiver::new(&config.archive)),
        )
        .with_staging_config(config.staging.clone())
        .with_layer_config(config.layer.clone())
    }

    pub fn with_context(mut self, ctx: Arc<dyn BuildContext>) -> Self {
        self.ctx = Some(ctx);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn with_staging_config(mut self, staging: StagingConfig) -> Self {
        self.staging = staging;
        self
    }

    pub fn with_layer_config(mut self, layer: LayerConfig) -> Self {
        self.layer = layer;
        self
    }

    /// Pin the date recorded in the image overrides
    pub fn with_build_date(mut self, date: NaiveDate) -> Self {
        self.build_date = Some(date);
        self
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn state(&self) -> BuildState {
        self.core.state()
    }

    fn phase(&self) -> BuildPhase {
        match self.descriptor.package() {
            Some(spec) => BuildPhase::SinglePackage {
                package_name: spec.name.clone(),
                package_version: spec.version.clone(),
            },
            None => BuildPhase::WholeTree,
        }
    }

    async fn log_cache_result(&self, key: &str, hit: bool) {
        let event = CacheEvent {
            hit,
            phase: self.phase(),
            key_version: self.layer.cache_key_version.clone(),
            language: self.layer.language.clone(),
            key: key.to_string(),
        };
        self.events.record(&event).await;
    }

    /// Query the cache once. Lookup failures count as a miss.
    async fn check_cache(&self, cache: &dyn CacheStore) -> DeplayerResult<Option<LayerImage>> {
        let started = Instant::now();
        let key = self.cache_key().await?;

        let cached = match cache.get(&key).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Cache lookup for {} failed, rebuilding: {}", key, e);
                None
            }
        };

        self.log_cache_result(&key, cached.is_some()).await;
        info!(
            "checking_cached_layer took {} ms",
            started.elapsed().as_millis()
        );
        Ok(cached)
    }

    /// Install, package and assemble a fresh image
    async fn build_fresh(&self) -> DeplayerResult<LayerImage> {
        let started = Instant::now();
        let stager = StagingInstaller::new(self.installer.clone(), self.staging.clone());
        let staged = stager
            .install(
                &self.descriptor,
                Path::new(&self.destination),
                self.ctx.as_deref(),
            )
            .await?;

        let blobs = self.archiver.package(staged.path()).await?;
        let date = self.build_date.unwrap_or_else(|| Utc::now().date_naive());
        let image = LayerImage::assemble(vec![blobs], Overrides::for_date(date))?;

        info!("building_layer took {} ms", started.elapsed().as_millis());
        Ok(image)
    }

    /// Persist a fresh image. Failures are logged, never returned.
    async fn store(&self, cache: &dyn CacheStore, image: &LayerImage) {
        let started = Instant::now();
        let key = match self.cache_key().await {
            Ok(key) => key,
            Err(e) => {
                warn!("Skipping cache upload, key unavailable: {}", e);
                return;
            }
        };

        match cache.set(&key, image).await {
            Ok(()) => info!("uploading_layer took {} ms", started.elapsed().as_millis()),
            Err(e) => warn!("Failed to cache layer {}: {}", key, e),
        }
    }

    /// Consume the builder, returning its image if one was built
    pub fn into_image(mut self) -> Option<LayerImage> {
        self.core.take_image()
    }
}

#[async_trait]
impl CacheableLayerBuilder for PackageLayerBuilder {
    fn core(&self) -> &LayerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LayerCore {
        &mut self.core
    }

    async fn compute_raw_cache_key(&self) -> DeplayerResult<String> {
        compute_raw_key(self.ctx.as_deref(), &self.descriptor, &self.destination).await
    }

    async fn build_layer(&mut self) -> DeplayerResult<BuildOutcome> {
        if let Some(outcome) = self.core.outcome() {
            return Ok(outcome);
        }

        let cache = self.cache.clone();
        let cached = match cache.as_deref() {
            Some(cache) => self.check_cache(cache).await?,
            None => None,
        };
        self.core.transition(BuildState::CacheChecked);

        if let Some(image) = cached {
            self.core.transition(BuildState::Reusing);
            return Ok(self.core.finish(image, BuildOutcome::Reused));
        }

        self.core.transition(BuildState::Building);
        let image = self.build_fresh().await?;
        if let Some(cache) = cache.as_deref() {
            self.store(cache, &image).await;
        }

        Ok(self.core.finish(image, BuildOutcome::Built))
    }
}
