use anyhow::Result;

use crate::config::LookalikeConfig;
use crate::store::persist;

/// Display feature store statistics in the terminal.
pub fn stats(config: &LookalikeConfig) -> Result<()> {
    let store_path = config.resolved_store_path();
    let (store, info) = persist::load_with_info(&store_path)?;
    let file_size = std::fs::metadata(&store_path).map(|m| m.len()).unwrap_or(0);

    println!("Feature Store");
    println!("{}", "=".repeat(40));
    println!("  Path:                {}", store_path.display());
    println!("  File size:           {}", format_bytes(file_size));
    println!("  Schema version:      {}", info.schema_version);
    println!("  Built:               {}", info.built_at.as_deref().unwrap_or("(unknown)"));
    println!();

    println!("Embedding model:");
    println!("  Stored:              {}", info.model.as_deref().unwrap_or("(not set)"));
    println!("  Configured:          {}", config.embedding.model);
    println!("  Dimensions:          {}", info.dimensions);
    if info.dimensions != config.embedding.dimensions {
        println!(
            "  WARNING: configured model produces {} dimensions. Run `lookalike index` to rebuild.",
            config.embedding.dimensions
        );
    }
    println!();

    println!("Images:                {}", store.len());
    println!("By Category:");
    let mut counts = store.category_counts();
    counts.sort();
    for (category, count) in &counts {
        println!("  {:<20} {}", category, count);
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
