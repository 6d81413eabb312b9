//! Ingest command handler.
//!
//! Ensures every configured collection has a persisted index.

use crate::commands::print_json;
use clap::Args;
use medrag_core::{config::AppConfig, AppError, AppResult};
use medrag_knowledge::IndexStatus;

/// Build missing collection indexes
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command");

        let results = medrag_knowledge::ingest(config).await?;
        let failures = results.iter().filter(|(_, r)| r.is_err()).count();

        if self.json {
            let output: Vec<_> = results
                .iter()
                .map(|(name, result)| match result {
                    Ok(status) => serde_json::json!({
                        "collection": name,
                        "result": status,
                    }),
                    Err(e) => serde_json::json!({
                        "collection": name,
                        "error": e.to_string(),
                        "kind": e.kind(),
                    }),
                })
                .collect();
            print_json(&output)?;
        } else {
            for (name, result) in &results {
                match result {
                    Ok(IndexStatus::Built(stats)) => println!(
                        "{}: built ({} chunks from {} pages in {:.2}s)",
                        name, stats.chunks, stats.pages, stats.duration_secs
                    ),
                    Ok(IndexStatus::AlreadyPresent) => println!("{}: already present", name),
                    Err(e) => println!("{}: failed: {}", name, e),
                }
            }
        }

        if failures > 0 {
            return Err(AppError::Other(format!(
                "{} of {} collections failed to ingest",
                failures,
                results.len()
            )));
        }

        Ok(())
    }
}
