//! Shared, swappable reference to the live feature store.

use std::sync::Arc;

use arc_swap::ArcSwap;

use super::FeatureStore;

/// Holds the store queries run against.
///
/// Readers take an `Arc` snapshot without locking. A rebuild is published with
/// [`replace`](Self::replace), which swaps the whole reference: in-flight
/// queries keep the snapshot they started with.
#[derive(Debug)]
pub struct StoreHandle {
    current: ArcSwap<FeatureStore>,
}

impl StoreHandle {
    pub fn new(store: FeatureStore) -> Self {
        Self {
            current: ArcSwap::from_pointee(store),
        }
    }

    pub fn snapshot(&self) -> Arc<FeatureStore> {
        self.current.load_full()
    }

    /// Publish `store` and return the one it replaced.
    pub fn replace(&self, store: FeatureStore) -> Arc<FeatureStore> {
        self.current.swap(Arc::new(store))
    }
}
