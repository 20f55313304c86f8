//! Query entry point for request handlers.
//!
//! [`MatchService`] takes raw upload bytes plus the loosely-typed form inputs,
//! runs the extractor on a blocking thread under a timeout, and ranks the
//! current store snapshot.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::embedding::Extractor;
use crate::error::MatchError;
use crate::matching::{parse_threshold, MatchQuery, MatchResult, Matcher};
use crate::store::handle::StoreHandle;
use crate::store::{persist, FeatureStore};

pub struct MatchService {
    extractor: Extractor,
    store: StoreHandle,
    matcher: Matcher,
    timeout: Duration,
}

impl MatchService {
    /// Fails if the extractor and `store` disagree on embedding length.
    pub fn new(
        extractor: Extractor,
        store: FeatureStore,
        matcher: Matcher,
        timeout: Duration,
    ) -> Result<Self, MatchError> {
        check_dimensions(&extractor, &store)?;
        Ok(Self {
            extractor,
            store: StoreHandle::new(store),
            matcher,
            timeout,
        })
    }

    /// Current store snapshot.
    pub fn store(&self) -> Arc<FeatureStore> {
        self.store.snapshot()
    }

    /// Embed `image` and rank the store against it.
    ///
    /// `threshold` is the raw caller input; anything unparseable becomes 0.4.
    pub async fn match_image(
        &self,
        image: Vec<u8>,
        category: Option<String>,
        threshold: Option<&str>,
    ) -> Result<Vec<MatchResult>, MatchError> {
        let threshold = parse_threshold(threshold);
        let embedding = self.embed(image).await?;

        let mut query = MatchQuery::new(embedding).with_threshold(threshold);
        if let Some(category) = category {
            query = query.with_category(category);
        }

        let store = self.store.snapshot();
        self.matcher.search(&store, &query)
    }

    /// Run the extractor off the async runtime, bounded by the configured timeout.
    pub async fn embed(&self, image: Vec<u8>) -> Result<Vec<f32>, MatchError> {
        let extractor = self.extractor.clone();
        let task = tokio::task::spawn_blocking(move || extractor.embed_bytes(&image));

        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "embedding timed out");
                Err(MatchError::Timeout(self.timeout))
            }
            Ok(Err(join)) => Err(MatchError::Capability(anyhow::anyhow!(
                "embedding task failed: {join}"
            ))),
            Ok(Ok(result)) => result,
        }
    }

    /// Swap in a new store. Queries already running keep the old one.
    pub fn replace_store(&self, store: FeatureStore) -> Result<Arc<FeatureStore>, MatchError> {
        check_dimensions(&self.extractor, &store)?;
        let images = store.len();
        let previous = self.store.replace(store);
        tracing::info!(previous = previous.len(), images, "feature store swapped");
        Ok(previous)
    }

    /// Load the store at `path` off the runtime and swap it in. Returns the new size.
    pub async fn reload_from(&self, path: &Path) -> Result<usize> {
        let path = path.to_path_buf();
        let store = tokio::task::spawn_blocking(move || persist::load(&path)).await??;
        let images = store.len();
        self.replace_store(store)?;
        Ok(images)
    }
}

fn check_dimensions(extractor: &Extractor, store: &FeatureStore) -> Result<(), MatchError> {
    if extractor.dimensions() != store.dimensions() {
        return Err(MatchError::DimensionMismatch {
            expected: store.dimensions(),
            actual: extractor.dimensions(),
        });
    }
    Ok(())
}
