//! CLI argument definitions using clap derive

use crate::descriptor::PackageSpec;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Deplayer - cached dependency layers for container images
///
/// Installs an application's dependencies into a staging directory,
/// packages them as an image layer and reuses the layer whenever the
/// dependency descriptors are unchanged.
#[derive(Parser, Debug)]
#[command(name = "deplayer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "DEPLAYER_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build (or reuse) a dependency layer
    Build(BuildArgs),

    /// Print the cache key for a descriptor without building
    Key(LayerArgs),

    /// Manage the local layer cache
    Cache(CacheArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Inputs identifying one dependency layer
#[derive(Args, Debug, Clone)]
pub struct LayerArgs {
    /// Build context directory holding the descriptor files
    #[arg(long, default_value = ".")]
    pub context: PathBuf,

    /// Descriptor file, relative to the context (repeatable, order matters)
    #[arg(short, long = "descriptor", default_values_t = [String::from("package.json")])]
    pub descriptors: Vec<String>,

    /// Install a single package instead of the whole tree (NAME@VERSION)
    #[arg(short, long)]
    pub package: Option<PackageSpec>,

    /// Install destination inside the image (default: from config)
    #[arg(long)]
    pub destination: Option<String>,
}

/// Arguments for the build command
#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub layer: LayerArgs,

    /// Skip the layer cache for this build
    #[arg(long)]
    pub no_cache: bool,

    /// Directory to write image.json and layer blobs into
    #[arg(short, long, default_value = "deplayer-out")]
    pub output: PathBuf,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached layers
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove cached layers older than N days
    Gc {
        /// Remove layers older than N days (default: from config)
        #[arg(long)]
        days: Option<u32>,

        /// Dry run - show what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove every cached layer
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}
