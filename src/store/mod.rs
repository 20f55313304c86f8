//! The feature store: an `N × D` embedding matrix positionally aligned with
//! `N` image records.
//!
//! A [`FeatureStore`] can only be produced by a [`FeatureStoreBuilder`] or by
//! [`persist::load`], both of which append an embedding and its record in one
//! step, so `embeddings[i]` always describes `records[i]`. Once built the store
//! is immutable; a rebuild produces a new store that replaces the old one
//! wholesale (see [`handle::StoreHandle`]).

pub mod handle;
pub mod persist;
pub mod schema;

use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::MatchError;

/// Metadata for one indexed image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Forward-slash path relative to the asset root, e.g. `dataset/cats/tom.jpg`.
    pub relative_path: String,
    /// Category label as found on disk (case preserved).
    pub category: String,
}

#[derive(Debug, Clone)]
pub struct FeatureStore {
    dimensions: usize,
    embeddings: Array2<f32>,
    norms: Vec<f32>,
    records: Vec<ImageRecord>,
}

impl FeatureStore {
    /// A valid store with no entries.
    pub fn empty(dimensions: usize) -> Self {
        FeatureStoreBuilder::new(dimensions).finish()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The full `N × D` matrix, rows in index order.
    pub fn embeddings(&self) -> ArrayView2<'_, f32> {
        self.embeddings.view()
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn embedding(&self, index: usize) -> Option<ArrayView1<'_, f32>> {
        (index < self.len()).then(|| self.embeddings.row(index))
    }

    pub fn record(&self, index: usize) -> Option<&ImageRecord> {
        self.records.get(index)
    }

    /// Euclidean norm of row `index`, computed once at build/load time.
    pub(crate) fn norm(&self, index: usize) -> f32 {
        self.norms[index]
    }

    /// `(index, embedding, record)` in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, ArrayView1<'_, f32>, &ImageRecord)> {
        self.embeddings
            .outer_iter()
            .zip(self.records.iter())
            .enumerate()
            .map(|(i, (row, record))| (i, row, record))
    }

    /// Entry count per category, in first-seen order.
    pub fn category_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for record in &self.records {
            match counts.iter_mut().find(|(c, _)| *c == record.category) {
                Some((_, n)) => *n += 1,
                None => counts.push((record.category.clone(), 1)),
            }
        }
        counts
    }
}

/// Accumulates aligned `(embedding, record)` pairs for a new store.
#[derive(Debug)]
pub struct FeatureStoreBuilder {
    dimensions: usize,
    data: Vec<f32>,
    records: Vec<ImageRecord>,
}

impl FeatureStoreBuilder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            data: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn with_capacity(dimensions: usize, capacity: usize) -> Self {
        Self {
            dimensions,
            data: Vec::with_capacity(dimensions * capacity),
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append one entry at the next index. Returns that index.
    pub fn push(&mut self, embedding: &[f32], record: ImageRecord) -> Result<usize, MatchError> {
        if embedding.len() != self.dimensions {
            return Err(MatchError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            });
        }
        self.data.extend_from_slice(embedding);
        self.records.push(record);
        Ok(self.records.len() - 1)
    }

    pub fn finish(self) -> FeatureStore {
        let rows = self.records.len();
        debug_assert_eq!(self.data.len(), rows * self.dimensions);
        let embeddings = Array2::from_shape_vec((rows, self.dimensions), self.data)
            .expect("push keeps one row per record");
        let norms = embeddings
            .outer_iter()
            .map(|row| row.dot(&row).sqrt())
            .collect();
        FeatureStore {
            dimensions: self.dimensions,
            embeddings,
            norms,
            records: self.records,
        }
    }
}
