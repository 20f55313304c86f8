//! Ranked similarity search over a [`FeatureStore`].
//!
//! Every entry is scored with cosine similarity against the query, filtered by
//! an inclusive threshold and an optional case-insensitive category, sorted by
//! score (ties keep index order) and cut to [`MAX_RESULTS`].

use std::path::Path;

use ndarray::ArrayView1;
use serde::Serialize;

use crate::error::MatchError;
use crate::store::{FeatureStore, ImageRecord};

/// Hard cap on results per query.
pub const MAX_RESULTS: usize = 30;

/// Threshold used when the caller supplies none, or something unparseable.
pub const DEFAULT_THRESHOLD: f32 = 0.4;

#[derive(Debug, Clone)]
pub struct MatchQuery {
    pub embedding: Vec<f32>,
    pub threshold: f32,
    /// Empty or `None` means no filter.
    pub category_filter: Option<String>,
}

impl MatchQuery {
    pub fn new(embedding: Vec<f32>) -> Self {
        Self {
            embedding,
            threshold: DEFAULT_THRESHOLD,
            category_filter: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category_filter = Some(category.into());
        self
    }

    fn category(&self) -> Option<&str> {
        self.category_filter.as_deref().filter(|c| !c.is_empty())
    }
}

/// One ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// File name without directory or extension.
    pub display_name: String,
    /// Category exactly as stored.
    pub category: String,
    pub similarity: f32,
    /// Public URL of the matched image.
    pub asset_url: String,
}

/// Lenient threshold parsing: missing, non-numeric or NaN input falls back to
/// [`DEFAULT_THRESHOLD`]. Any other number is kept as-is, infinities included.
pub fn parse_threshold(raw: Option<&str>) -> f32 {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f32>().ok())
        .filter(|t| !t.is_nan())
        .unwrap_or(DEFAULT_THRESHOLD)
}

/// Dot product over the product of Euclidean norms; 0 if either norm is 0.
pub fn cosine_similarity(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    cosine_with_norms(a, norm_a, b, norm_b)
}

fn cosine_with_norms(
    a: ArrayView1<'_, f32>,
    norm_a: f32,
    b: ArrayView1<'_, f32>,
    norm_b: f32,
) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    a.dot(&b) / (norm_a * norm_b)
}

/// Turns a stored relative path into the URL the asset server exposes.
pub fn asset_url(prefix: &str, relative_path: &str) -> String {
    let path = relative_path.replace('\\', "/");
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Base name of `relative_path` without its extension.
pub fn display_name(relative_path: &str) -> String {
    let path = relative_path.replace('\\', "/");
    Path::new(&path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(path)
}

/// Scores queries against a store and shapes the results.
#[derive(Debug, Clone)]
pub struct Matcher {
    asset_url_prefix: String,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new("/static")
    }
}

impl Matcher {
    pub fn new(asset_url_prefix: impl Into<String>) -> Self {
        Self {
            asset_url_prefix: asset_url_prefix.into(),
        }
    }

    /// Full linear scan of `store`. Empty stores yield no results.
    ///
    /// Fails only when the query vector's length differs from the store's.
    pub fn search(
        &self,
        store: &FeatureStore,
        query: &MatchQuery,
    ) -> Result<Vec<MatchResult>, MatchError> {
        if query.embedding.len() != store.dimensions() {
            return Err(MatchError::DimensionMismatch {
                expected: store.dimensions(),
                actual: query.embedding.len(),
            });
        }

        let q = ArrayView1::from(query.embedding.as_slice());
        let q_norm = q.dot(&q).sqrt();
        let category = query.category().map(str::to_lowercase);

        let mut candidates: Vec<(usize, f32)> = store
            .iter()
            .filter(|(_, _, record)| category_matches(record, category.as_deref()))
            .map(|(i, row, _)| (i, cosine_with_norms(q, q_norm, row, store.norm(i))))
            .filter(|(_, sim)| *sim >= query.threshold)
            .collect();

        // Stable: equal scores stay in index order.
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        candidates.truncate(MAX_RESULTS);

        tracing::debug!(
            scanned = store.len(),
            returned = candidates.len(),
            threshold = query.threshold,
            category = category.as_deref().unwrap_or(""),
            "similarity search complete"
        );

        Ok(candidates
            .into_iter()
            .filter_map(|(i, similarity)| {
                store.record(i).map(|record| MatchResult {
                    display_name: display_name(&record.relative_path),
                    category: record.category.clone(),
                    similarity,
                    asset_url: asset_url(&self.asset_url_prefix, &record.relative_path),
                })
            })
            .collect())
    }
}

fn category_matches(record: &ImageRecord, filter_lower: Option<&str>) -> bool {
    match filter_lower {
        None => true,
        Some(filter) => record.category.to_lowercase() == filter,
    }
}
