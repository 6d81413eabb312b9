//! Command handlers for the MedRAG CLI.

pub mod ask;
pub mod ingest;
pub mod serve;
pub mod status;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use ingest::IngestCommand;
pub use serve::ServeCommand;
pub use status::StatusCommand;

use medrag_core::{AppError, AppResult};
use serde::Serialize;

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
