use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

use crate::config::LookalikeConfig;
use crate::embedding::Extractor;
use crate::matching::Matcher;
use crate::service::MatchService;
use crate::store::persist;

/// Run a similarity search for one image file from the terminal.
pub async fn search(
    config: &LookalikeConfig,
    image: &Path,
    category: Option<String>,
    threshold: Option<String>,
) -> Result<()> {
    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("failed to read {}", image.display()))?;

    let store_path = config.resolved_store_path();
    let store = tokio::task::spawn_blocking(move || persist::load(&store_path)).await??;

    let embedding_config = config.embedding.clone();
    let extractor =
        tokio::task::spawn_blocking(move || Extractor::from_config(&embedding_config)).await??;

    let service = MatchService::new(
        extractor,
        store,
        Matcher::new(config.storage.asset_url_prefix.clone()),
        Duration::from_secs(config.embedding.timeout_secs),
    )?;

    let results = service
        .match_image(bytes, category, threshold.as_deref())
        .await?;

    if results.is_empty() {
        println!("No matches found.");
        return Ok(());
    }

    println!("Found {} match(es)\n", results.len());
    for (i, result) in results.iter().enumerate() {
        println!(
            "  {:>2}. {:.4}  [{}] {}",
            i + 1,
            result.similarity,
            result.category,
            result.display_name,
        );
        println!("      {}", result.asset_url);
    }

    Ok(())
}
