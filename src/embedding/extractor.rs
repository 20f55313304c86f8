//! The embedding extractor: image in, fixed-length vector out.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use image::DynamicImage;

use super::{preprocess, EmbeddingCapability};
use crate::config::EmbeddingConfig;
use crate::error::MatchError;

/// Wraps an [`EmbeddingCapability`] with decoding and preprocessing.
///
/// Cheap to clone; clones share the same capability.
#[derive(Clone)]
pub struct Extractor {
    capability: Arc<dyn EmbeddingCapability>,
    input_size: u32,
}

impl Extractor {
    pub fn new(capability: Arc<dyn EmbeddingCapability>, input_size: u32) -> Self {
        Self {
            capability,
            input_size,
        }
    }

    /// Load the configured capability and wrap it.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let capability = super::create_capability(config)?;
        Ok(Self::new(Arc::from(capability), config.input_size))
    }

    /// Length of every vector this extractor returns.
    pub fn dimensions(&self) -> usize {
        self.capability.dimensions()
    }

    pub fn embed_bytes(&self, bytes: &[u8]) -> Result<Vec<f32>, MatchError> {
        let img = preprocess::decode(bytes)?;
        self.embed_image(&img)
    }

    pub fn embed_path(&self, path: &Path) -> Result<Vec<f32>, MatchError> {
        let bytes = std::fs::read(path).map_err(|source| MatchError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.embed_bytes(&bytes)
    }

    pub fn embed_image(&self, img: &DynamicImage) -> Result<Vec<f32>, MatchError> {
        let input = preprocess::to_input_tensor(img, self.input_size);
        let embedding = self
            .capability
            .embed(&input)
            .map_err(MatchError::Capability)?;

        let expected = self.dimensions();
        if embedding.len() != expected {
            return Err(MatchError::Capability(anyhow::anyhow!(
                "model returned {} values, expected {expected}",
                embedding.len()
            )));
        }
        Ok(embedding)
    }
}
