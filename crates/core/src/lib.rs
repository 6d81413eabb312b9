//! MedRAG Core Library
//!
//! This crate provides the foundational utilities shared by every MedRAG crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management (collections, providers, policy inputs)

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, CollectionConfig};
pub use error::{AppError, AppResult};
