//! Local ONNX Runtime embedding capability.
//!
//! Implements [`EmbeddingCapability`] over a MobileNetV2 feature extractor
//! exported with global average pooling and no classifier head, so the single
//! output is the pooled `[1, 1280]` feature vector.

use std::sync::Mutex;

use anyhow::{Context, Result};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;

use super::EmbeddingCapability;
use crate::config::EmbeddingConfig;

/// ONNX Runtime session plus the tensor names it is driven with.
pub struct LocalCapability {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    dimensions: usize,
}

// Safety: Session is behind a Mutex, which guarantees exclusive access during run().
unsafe impl Send for LocalCapability {}
unsafe impl Sync for LocalCapability {}

impl LocalCapability {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_path = config.model_path();

        anyhow::ensure!(
            model_path.exists(),
            "ONNX model not found at {}. Run `lookalike model download --url <URL>` first.",
            model_path.display()
        );

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.intra_threads)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        tracing::info!(
            model = %model_path.display(),
            dimensions = config.dimensions,
            "ONNX model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name: config.input_name.clone(),
            output_name: config.output_name.clone(),
            dimensions: config.dimensions,
        })
    }
}

impl EmbeddingCapability for LocalCapability {
    fn embed(&self, input: &Array4<f32>) -> Result<Vec<f32>> {
        let tensor = TensorRef::from_array_view(input).context("failed to build input tensor")?;

        // One image at a time: the lock is held until the output is copied out.
        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("session lock poisoned: {e}"))?;

        let outputs = session.run(ort::inputs! {
            self.input_name.as_str() => tensor,
        })?;

        // Export tools disagree on output names; fall back to the first output.
        let features = outputs
            .get(self.output_name.as_str())
            .unwrap_or_else(|| &outputs[0]);

        let (shape, data) = features
            .try_extract_tensor::<f32>()
            .context("failed to extract feature tensor")?;

        let dims: &[i64] = &shape;
        anyhow::ensure!(
            data.len() == self.dimensions,
            "unexpected feature shape: {dims:?}, expected [1, {}]",
            self.dimensions
        );

        Ok(data.to_vec())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
