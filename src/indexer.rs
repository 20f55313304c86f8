//! Offline indexer: walks a categorized dataset and builds a [`FeatureStore`].
//!
//! Layout: `<dataset>/<category>/<image>`. Categories and files are visited in
//! lexicographic order so an unchanged dataset always produces the same
//! indices. A file that cannot be embedded is logged, recorded in the
//! [`BuildReport`] and skipped; it never aborts the build.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::embedding::Extractor;
use crate::store::{persist, FeatureStore, FeatureStoreBuilder, ImageRecord};

/// An image found during discovery, before embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetImage {
    pub path: PathBuf,
    pub category: String,
    /// Forward-slash path relative to the asset root.
    pub relative_path: String,
}

/// A file or directory left out of the store, and why.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedImage {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of one indexer run.
#[derive(Debug)]
pub struct BuildReport {
    pub store: FeatureStore,
    pub skipped: Vec<SkippedImage>,
}

impl BuildReport {
    pub fn indexed(&self) -> usize {
        self.store.len()
    }
}

pub struct Indexer {
    extractor: Extractor,
    asset_root: PathBuf,
}

impl Indexer {
    /// `asset_root` must contain the dataset; stored paths are relative to it.
    pub fn new(extractor: Extractor, asset_root: impl Into<PathBuf>) -> Self {
        Self {
            extractor,
            asset_root: asset_root.into(),
        }
    }

    /// List every candidate image in index order.
    ///
    /// Unreadable category directories are returned as skips rather than errors.
    pub fn discover(&self, dataset_root: &Path) -> Result<(Vec<DatasetImage>, Vec<SkippedImage>)> {
        let dataset_root = std::fs::canonicalize(dataset_root)
            .with_context(|| format!("dataset directory not found: {}", dataset_root.display()))?;
        anyhow::ensure!(
            dataset_root.is_dir(),
            "dataset path is not a directory: {}",
            dataset_root.display()
        );
        let asset_root = std::fs::canonicalize(&self.asset_root).with_context(|| {
            format!("asset root not found: {}", self.asset_root.display())
        })?;
        anyhow::ensure!(
            dataset_root.starts_with(&asset_root),
            "dataset {} is not inside asset root {}",
            dataset_root.display(),
            asset_root.display()
        );

        let mut images = Vec::new();
        let mut skipped = Vec::new();

        // Top-level files are not categories.
        let categories = sorted_entries(&dataset_root)?
            .into_iter()
            .filter(|p| p.is_dir());

        for category_dir in categories {
            let category = file_name(&category_dir);
            let files = match sorted_entries(&category_dir) {
                Ok(files) => files,
                Err(e) => {
                    tracing::warn!(path = %category_dir.display(), error = %e, "skipping unreadable category");
                    skipped.push(SkippedImage {
                        path: category_dir.clone(),
                        reason: format!("{e:#}"),
                    });
                    continue;
                }
            };

            for path in files.into_iter().filter(|p| p.is_file()) {
                let relative_path = relative_to(&path, &asset_root)?;
                images.push(DatasetImage {
                    path,
                    category: category.clone(),
                    relative_path,
                });
            }
        }

        Ok((images, skipped))
    }

    pub fn build(&self, dataset_root: &Path) -> Result<BuildReport> {
        self.build_with_progress(dataset_root, |_| {})
    }

    /// Build a store, calling `on_image` after each attempted file.
    pub fn build_with_progress(
        &self,
        dataset_root: &Path,
        mut on_image: impl FnMut(&DatasetImage),
    ) -> Result<BuildReport> {
        let (images, mut skipped) = self.discover(dataset_root)?;
        tracing::info!(
            dataset = %dataset_root.display(),
            candidates = images.len(),
            "indexing dataset"
        );

        let mut builder = FeatureStoreBuilder::with_capacity(self.extractor.dimensions(), images.len());
        for image in &images {
            let outcome = self.extractor.embed_path(&image.path).and_then(|embedding| {
                builder.push(
                    &embedding,
                    ImageRecord {
                        relative_path: image.relative_path.clone(),
                        category: image.category.clone(),
                    },
                )
            });

            match outcome {
                Ok(idx) => {
                    tracing::debug!(idx, path = %image.relative_path, category = %image.category, "indexed");
                }
                Err(e) => {
                    tracing::warn!(path = %image.path.display(), error = %e, "skipped image");
                    skipped.push(SkippedImage {
                        path: image.path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
            on_image(image);
        }

        let store = builder.finish();
        tracing::info!(
            indexed = store.len(),
            skipped = skipped.len(),
            "index build complete"
        );
        Ok(BuildReport { store, skipped })
    }

    /// Build from `dataset_root` and replace the store at `store_path`.
    pub fn rebuild(&self, dataset_root: &Path, store_path: &Path, model: &str) -> Result<BuildReport> {
        let report = self.build(dataset_root)?;
        persist::save(&report.store, store_path, model)?;
        Ok(report)
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("failed to list directory {}", dir.display()))?;
    entries.sort();
    Ok(entries)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `path` relative to `root`, joined with `/` regardless of platform.
fn relative_to(path: &Path, root: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(root)
        .with_context(|| format!("{} is not under {}", path.display(), root.display()))?;
    Ok(rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_use_forward_slashes() {
        let root = Path::new("/srv/static");
        let path = root.join("dataset").join("cats").join("tom.jpg");
        assert_eq!(relative_to(&path, root).unwrap(), "dataset/cats/tom.jpg");
    }

    #[test]
    fn relative_to_rejects_outside_paths() {
        assert!(relative_to(Path::new("/elsewhere/a.jpg"), Path::new("/srv/static")).is_err());
    }

    #[test]
    fn sorted_entries_are_lexicographic() {
        let tmp = tempfile::TempDir::new().unwrap();
        for name in ["b.png", "a.png", "c.png"] {
            std::fs::write(tmp.path().join(name), b"x").unwrap();
        }
        let names: Vec<_> = sorted_entries(tmp.path())
            .unwrap()
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
    }
}
