//! Prompt system for MedRAG.
//!
//! This crate renders the "stuff" prompt that places every retrieved chunk
//! into one context block ahead of the question:
//! - YAML-based prompt definitions (with a built-in default)
//! - Handlebars template rendering

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::load_prompt;
pub use types::{BuiltPrompt, PromptChunk, PromptDefinition};
