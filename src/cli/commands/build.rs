//! Build command - build or reuse a dependency layer

use crate::builder::{BuildOutcome, CacheableLayerBuilder, PackageLayerBuilder};
use crate::cache::{format_bytes, LocalCacheStore};
use crate::cli::args::{BuildArgs, LayerArgs};
use crate::config::{Config, ConfigManager};
use crate::context::DirectoryContext;
use crate::descriptor::Descriptor;
use crate::error::{DeplayerError, DeplayerResult};
use crate::events::EventLog;
use crate::image::LayerImage;
use console::style;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config) -> DeplayerResult<()> {
    let mut builder = layer_builder(&args.layer, config)?.with_events(Arc::new(EventLog::new(
        config.general.event_log,
        ConfigManager::event_log_path(),
    )));

    if config.cache.enabled && !args.no_cache {
        let cache_dir = ConfigManager::cache_dir(config);
        debug!("Using layer cache at {}", cache_dir.display());
        builder = builder.with_cache(Arc::new(LocalCacheStore::new(cache_dir)));
    } else {
        debug!("Layer cache disabled");
    }

    let outcome = builder.build_layer().await?;
    let key = builder.cache_key().await?;
    let image = builder
        .into_image()
        .ok_or_else(|| DeplayerError::Internal("builder finished without an image".to_string()))?;

    write_output(&args.output, &image).await?;

    let size: usize = image.layers().iter().map(|l| l.compressed.len()).sum();
    let verb = match outcome {
        BuildOutcome::Reused => "Reused cached layer",
        BuildOutcome::Built => "Built layer",
    };
    println!(
        "{} {} {} ({})",
        style("✓").green(),
        verb,
        style(&key[..12]).cyan(),
        format_bytes(size as u64)
    );
    println!("  written to {}", args.output.display());

    Ok(())
}

/// Descriptor described by the command line
pub(crate) fn descriptor(args: &LayerArgs) -> DeplayerResult<Descriptor> {
    let descriptor = Descriptor::new(args.descriptors.clone())?;
    Ok(match &args.package {
        Some(spec) => descriptor.with_package(spec.clone()),
        None => descriptor,
    })
}

/// Builder for the layer described by the command line, without cache or sinks
pub(crate) fn layer_builder(args: &LayerArgs, config: &Config) -> DeplayerResult<PackageLayerBuilder> {
    if !args.context.is_dir() {
        return Err(DeplayerError::User(format!(
            "Build context {} is not a directory",
            args.context.display()
        )));
    }

    let mut builder = PackageLayerBuilder::from_config(config, descriptor(args)?)
        .with_context(Arc::new(DirectoryContext::new(&args.context)));
    if let Some(destination) = &args.destination {
        builder = builder.with_destination(destination.clone());
    }
    Ok(builder)
}

/// Write the image manifest and compressed blobs to `output`
async fn write_output(output: &Path, image: &LayerImage) -> DeplayerResult<()> {
    fs::create_dir_all(output)
        .await
        .map_err(|e| DeplayerError::io(format!("creating {}", output.display()), e))?;

    for (index, layer) in image.layers().iter().enumerate() {
        let path = output.join(format!("layer-{}.tar.gz", index));
        fs::write(&path, &layer.compressed)
            .await
            .map_err(|e| DeplayerError::io(format!("writing {}", path.display()), e))?;
    }

    let manifest = serde_json::to_vec_pretty(&image.manifest())?;
    let path = output.join("image.json");
    fs::write(&path, manifest)
        .await
        .map_err(|e| DeplayerError::io(format!("writing {}", path.display()), e))
}
