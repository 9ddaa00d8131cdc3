//! Key command - print the cache key for a layer

use super::build::layer_builder;
use crate::builder::CacheableLayerBuilder;
use crate::cli::args::LayerArgs;
use crate::config::Config;
use crate::error::DeplayerResult;

/// Execute the key command
pub async fn execute(args: LayerArgs, config: &Config) -> DeplayerResult<()> {
    let builder = layer_builder(&args, config)?;
    println!("{}", builder.cache_key().await?);
    Ok(())
}
