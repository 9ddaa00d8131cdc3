//! Layer images
//!
//! A `LayerImage` is an ordered stack of blob pairs plus normalized
//! metadata overrides. Order is the filesystem stacking order.

use crate::error::{DeplayerError, DeplayerResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One filesystem layer as a compressed/uncompressed tar pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobPair {
    /// gzip-compressed tar
    pub compressed: Vec<u8>,
    /// the same tar, uncompressed
    pub uncompressed: Vec<u8>,
}

impl BlobPair {
    pub fn new(compressed: Vec<u8>, uncompressed: Vec<u8>) -> Self {
        Self {
            compressed,
            uncompressed,
        }
    }

    /// Content digest of the compressed blob
    pub fn digest(&self) -> String {
        sha256_digest(&self.compressed)
    }

    /// Content digest of the uncompressed tar (the layer's diff ID)
    pub fn diff_id(&self) -> String {
        sha256_digest(&self.uncompressed)
    }

    pub fn descriptor(&self) -> LayerDescriptor {
        LayerDescriptor {
            digest: self.digest(),
            diff_id: self.diff_id(),
            size: self.compressed.len() as u64,
        }
    }
}

fn sha256_digest(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

/// Metadata of a layer, without its content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub digest: String,
    pub diff_id: String,
    pub size: u64,
}

/// Image metadata fields applied at assembly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overrides {
    /// Creation timestamp truncated to the day, `YYYY-MM-DDT00:00:00Z`
    pub created: String,
}

impl Overrides {
    /// Overrides for a build on `date`
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            created: format!("{}T00:00:00Z", date.format("%Y-%m-%d")),
        }
    }

    /// Overrides for a build at `time`; time of day is dropped
    pub fn at(time: DateTime<Utc>) -> Self {
        Self::for_date(time.date_naive())
    }

    /// Overrides for a build today (UTC)
    pub fn today() -> Self {
        Self::at(Utc::now())
    }
}

/// An assembled image: ordered layers plus overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerImage {
    layers: Vec<BlobPair>,
    overrides: Overrides,
}

/// Serializable summary of an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageManifest {
    pub created: String,
    pub layers: Vec<LayerDescriptor>,
}

impl LayerImage {
    /// Assemble an image from blob pairs in stacking order
    pub fn assemble(layers: Vec<BlobPair>, overrides: Overrides) -> DeplayerResult<Self> {
        if layers.is_empty() {
            return Err(DeplayerError::EmptyImage);
        }
        Ok(Self { layers, overrides })
    }

    /// Stack several images into one, bottom first. The topmost image's
    /// overrides win.
    pub fn stack(images: Vec<LayerImage>) -> DeplayerResult<Self> {
        let overrides = images
            .last()
            .map(|img| img.overrides.clone())
            .ok_or(DeplayerError::EmptyImage)?;
        let layers = images.into_iter().flat_map(|img| img.layers).collect();
        Self::assemble(layers, overrides)
    }

    pub fn layers(&self) -> &[BlobPair] {
        &self.layers
    }

    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    pub fn manifest(&self) -> ImageManifest {
        ImageManifest {
            created: self.overrides.created.clone(),
            layers: self.layers.iter().map(BlobPair::descriptor).collect(),
        }
    }
}
