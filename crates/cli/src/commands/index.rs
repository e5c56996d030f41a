//! `zhifa index`: Build or update a vector store from source documents.

use std::path::PathBuf;
use std::sync::Arc;
use zhifa_knowledge::{Collection, IndexSettings, Indexer, ProviderEmbedder};

use super::{embedding_provider, load_config, CliResult};

pub async fn run(collection: Collection, source: PathBuf, db: Option<PathBuf>) -> CliResult {
    let config = load_config()?;
    let k = &config.knowledge;

    let db_dir = db.unwrap_or_else(|| match collection {
        Collection::Legal => k.legal_db_dir.clone(),
        Collection::Case => k.case_db_dir.clone(),
    });

    let router = zhifa_providers::build_from_config(&config);
    let embedder = Arc::new(ProviderEmbedder::new(
        embedding_provider(&config, &router)?,
        &k.embedding_model,
    ));
    let indexer = Indexer::new(embedder).with_settings(IndexSettings {
        chunk_size: k.chunk_size,
        chunk_overlap: k.chunk_overlap,
        batch_size: k.embed_batch_size,
    });

    println!("📚 Indexing {} documents", collection.as_str());
    println!("   Source:  {}", source.display());
    println!("   Store:   {}", db_dir.display());
    println!("   Model:   {}", k.embedding_model);
    println!();

    let report = indexer
        .index_directory(collection, &source, &db_dir)
        .await
        .map_err(|e| format!("Indexing failed: {e}"))?;

    println!("✅ Indexed {} file(s), {} chunk(s) added", report.files_indexed, report.chunks_added);
    if report.files_skipped > 0 {
        println!("   {} file(s) already indexed, skipped", report.files_skipped);
    }
    Ok(())
}
