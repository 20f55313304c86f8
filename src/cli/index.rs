//! CLI `index` command: rebuild the feature store from the dataset directory.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::config::LookalikeConfig;
use crate::embedding::Extractor;
use crate::indexer::Indexer;
use crate::store::persist;

/// Walk the dataset, embed every image and overwrite the stored index.
pub fn index(
    config: &LookalikeConfig,
    dataset: Option<PathBuf>,
    asset_root: Option<PathBuf>,
) -> Result<()> {
    let dataset = dataset.unwrap_or_else(|| config.resolved_dataset_dir());
    let asset_root = asset_root.unwrap_or_else(|| config.resolved_asset_root());
    let store_path = config.resolved_store_path();

    let extractor =
        Extractor::from_config(&config.embedding).context("failed to create embedding extractor")?;
    let indexer = Indexer::new(extractor, &asset_root);

    let (images, _) = indexer.discover(&dataset)?;
    println!(
        "Indexing {} image(s) from {} with model '{}'...",
        images.len(),
        dataset.display(),
        config.embedding.model
    );

    let pb = super::image_progress(images.len())?;
    let report = indexer.build_with_progress(&dataset, |image| {
        pb.set_message(image.relative_path.clone());
        pb.inc(1);
    })?;
    pb.finish_and_clear();

    persist::save(&report.store, &store_path, &config.embedding.model)?;

    println!(
        "Saved {} feature vector(s) to {}.",
        report.indexed(),
        store_path.display()
    );
    if !report.skipped.is_empty() {
        println!("Skipped {}:", report.skipped.len());
        for skip in &report.skipped {
            println!("  {}: {}", skip.path.display(), skip.reason);
        }
    }
    Ok(())
}
