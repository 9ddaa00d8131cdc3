//! Deplayer - cached dependency layers for container images
//!
//! Installs an application's dependencies into a staging directory,
//! packages the tree as a compressed image layer and reuses a cached
//! layer whenever the dependency descriptors are unchanged.

pub mod archive;
pub mod builder;
pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod image;
pub mod install;
pub mod process;

pub use error::{DeplayerError, DeplayerResult};
