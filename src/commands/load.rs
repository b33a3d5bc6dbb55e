use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use knowledge_extractor::config::Config;
use knowledge_extractor::loader::{read_guid_file, DocumentFetcher, DocumentLoader, DocumentStore};
use knowledge_extractor::utils::format_elapsed;

/// Load every document listed in `file` into the document store
pub async fn load(file: PathBuf, config: Config) -> Result<()> {
    if !file.is_file() {
        anyhow::bail!("GUID file {} does not exist", file.display());
    }

    let guids = read_guid_file(&file)
        .with_context(|| format!("Failed to read GUID file: {}", file.display()))?;

    println!("Loading {} documents...", guids.len());
    println!("  Source: {}", config.loader.url_template);
    println!("  Store: {}", config.storage.documents_dir.display());

    let fetcher = DocumentFetcher::with_config(&config.loader)
        .context("Failed to create document fetcher")?;
    let loader = DocumentLoader::new(
        Arc::new(fetcher),
        DocumentStore::new(&config.storage.documents_dir),
        config.loader.max_concurrent_requests,
    );

    let report = loader.load(&guids).await;

    println!();
    println!("  Loaded: {}", report.loaded.len());
    println!("  Already present: {}", report.skipped.len());
    println!("  Failed: {}", report.failed.len());
    for (guid, error) in &report.failed {
        println!("    {guid}: {error}");
    }
    println!(
        "{} documents loaded in {}",
        report.loaded.len(),
        format_elapsed(report.elapsed)
    );

    Ok(())
}
