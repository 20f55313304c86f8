//! Image-to-vector embedding pipeline.
//!
//! The model itself is opaque: anything implementing [`EmbeddingCapability`]
//! turns a preprocessed input tensor into a fixed-length vector. The
//! [`Extractor`] owns decoding and preprocessing and is the only thing the
//! indexer and matcher talk to. Capabilities are built once via
//! [`create_capability`] and shared behind an `Arc`.

pub mod extractor;
pub mod local;
pub mod preprocess;

pub use extractor::Extractor;

use anyhow::Result;
use ndarray::Array4;

/// Embedding length of the MobileNetV2 feature extractor (global average pooling).
pub const EMBEDDING_DIM: usize = 1280;

/// The opaque embedding model.
///
/// `input` is a `[1, H, W, 3]` tensor already scaled to the model's expected
/// range. Implementations must be deterministic for a fixed input and must
/// return exactly [`dimensions`](Self::dimensions) values. All methods are
/// synchronous; async callers should go through `tokio::task::spawn_blocking`.
pub trait EmbeddingCapability: Send + Sync {
    fn embed(&self, input: &Array4<f32>) -> Result<Vec<f32>>;

    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Create an embedding capability from config.
///
/// Currently only `"local"` is supported (ONNX Runtime).
/// Returns an error if the model file is missing. Run `lookalike model download` first.
pub fn create_capability(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EmbeddingCapability>> {
    match config.provider.as_str() {
        "local" => {
            let capability = local::LocalCapability::new(config)?;
            Ok(Box::new(capability))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local"),
    }
}
