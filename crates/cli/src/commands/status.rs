//! Status command handler.
//!
//! Reports index presence per collection without loading any vectors.

use crate::commands::print_json;
use clap::Args;
use medrag_core::{config::AppConfig, AppResult};
use medrag_knowledge::index;
use serde::Serialize;

/// Show index status for every collection
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectionReport {
    collection: String,
    source: String,
    index_dir: String,
    present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    manifest: Option<index::IndexManifest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl StatusCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing status command");

        let reports: Vec<CollectionReport> = config
            .collections
            .iter()
            .map(|collection| {
                let dir = collection.index_path(&config.workspace);
                let present = index::index_exists(&dir);
                let (manifest, error) = if present {
                    match index::read_manifest(&dir) {
                        Ok(manifest) => (Some(manifest), None),
                        Err(e) => (None, Some(e.to_string())),
                    }
                } else {
                    (None, None)
                };

                CollectionReport {
                    collection: collection.name.clone(),
                    source: collection.source_path(&config.workspace).display().to_string(),
                    index_dir: dir.display().to_string(),
                    present,
                    manifest,
                    error,
                }
            })
            .collect();

        if self.json {
            return print_json(&reports);
        }

        for report in &reports {
            println!("Collection: {}", report.collection);
            println!("  Source: {}", report.source);
            println!("  Index: {}", report.index_dir);
            match (&report.manifest, &report.error) {
                (Some(manifest), _) => {
                    println!("  Chunks: {}", manifest.chunk_count);
                    println!(
                        "  Embedding: {}/{} ({} dims)",
                        manifest.embedding_provider, manifest.embedding_model, manifest.dimensions
                    );
                    println!("  Built: {}", manifest.built_at.to_rfc3339());
                }
                (None, Some(error)) => println!("  Unreadable: {}", error),
                (None, None) => println!("  Not built"),
            }
        }

        Ok(())
    }
}
