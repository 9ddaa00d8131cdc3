//! Cache command - manage the local layer cache

use crate::cache::{format_bytes, CacheEntry, LocalCacheStore};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::DeplayerResult;
use chrono::Utc;
use console::style;
use std::io::{self, Write};
use tracing::debug;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> DeplayerResult<()> {
    let store = LocalCacheStore::new(ConfigManager::cache_dir(config));
    debug!("Layer cache at {}", store.root().display());

    match args.action {
        CacheAction::List { format } => list_layers(&store, format).await,
        CacheAction::Gc { days, dry_run } => gc_layers(&store, config, days, dry_run).await,
        CacheAction::Clear { yes } => clear_layers(&store, yes).await,
    }
}

/// List cached layers
async fn list_layers(store: &LocalCacheStore, format: OutputFormat) -> DeplayerResult<()> {
    let entries = store.list().await?;

    if entries.is_empty() {
        if matches!(format, OutputFormat::Json) {
            println!("[]");
        } else {
            println!("No cached layers found.");
        }
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_table(&entries),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => entries.iter().for_each(|e| println!("{}", e.key)),
    }

    Ok(())
}

fn print_table(entries: &[CacheEntry]) {
    println!(
        "{:<16} {:<8} {:<12} {:<20}",
        "KEY", "LAYERS", "SIZE", "STORED"
    );
    println!("{}", "-".repeat(60));

    for entry in entries {
        println!(
            "{:<16} {:<8} {:<12} {:<20}",
            short_key(&entry.key),
            entry.layers,
            format_bytes(entry.size_bytes),
            entry.stored_at.format("%Y-%m-%d %H:%M")
        );
    }

    let total: u64 = entries.iter().map(|e| e.size_bytes).sum();
    println!();
    println!(
        "Total: {} layer(s), {}",
        entries.len(),
        format_bytes(total)
    );
}

fn short_key(key: &str) -> &str {
    key.get(..12).unwrap_or(key)
}

/// Remove layers older than the configured age
async fn gc_layers(
    store: &LocalCacheStore,
    config: &Config,
    days_override: Option<u32>,
    dry_run: bool,
) -> DeplayerResult<()> {
    let gc_days = days_override.unwrap_or(config.cache.gc_days);

    if gc_days == 0 && days_override.is_none() {
        println!("Cache GC is disabled (gc_days = 0)");
        return Ok(());
    }

    let expired = store.expired(gc_days).await?;
    if expired.is_empty() {
        println!("No cached layers older than {} days.", gc_days);
        return Ok(());
    }

    println!(
        "Found {} cached layer(s) older than {} days:",
        expired.len(),
        gc_days
    );
    for entry in &expired {
        let age_days = (Utc::now() - entry.stored_at).num_days();
        println!(
            "  {} {} ({} days old)",
            style("•").red(),
            short_key(&entry.key),
            age_days
        );
    }

    if dry_run {
        println!();
        println!("Dry run - no layers removed.");
        return Ok(());
    }

    let removed = store.gc(gc_days).await?;
    println!(
        "{} removed {} cached layer(s)",
        style("✓").green(),
        removed.len()
    );

    Ok(())
}

/// Remove every cached layer
async fn clear_layers(store: &LocalCacheStore, skip_confirm: bool) -> DeplayerResult<()> {
    let entries = store.list().await?;

    if entries.is_empty() {
        println!("No cached layers to clear.");
        return Ok(());
    }

    println!("This will remove {} cached layer(s).", entries.len());

    if !skip_confirm {
        print!("Are you sure? [y/N] ");
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            println!("Failed to read input, aborting.");
            return Ok(());
        }

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    for entry in &entries {
        debug!("Removing cached layer {}", entry.key);
        store.remove(&entry.key).await?;
    }

    println!(
        "{} cleared {} cached layer(s)",
        style("✓").green(),
        entries.len()
    );

    Ok(())
}
