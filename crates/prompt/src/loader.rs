//! Prompt loader for YAML prompt definitions.

use crate::types::PromptDefinition;
use medrag_core::{AppError, AppResult};
use std::path::Path;

/// Load a prompt definition from a YAML file.
///
/// # Example
/// ```no_run
/// use medrag_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("prompts/clinical.yml"))?;
/// println!("Loaded prompt: {}", prompt.id);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(path: &Path) -> AppResult<PromptDefinition> {
    tracing::debug!("Loading prompt from: {:?}", path);

    if !path.exists() {
        return Err(AppError::Prompt(format!("Prompt file not found: {:?}", path)));
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| AppError::Prompt(format!("Failed to read prompt file {:?}: {}", path, e)))?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {:?}: {}", path, e))
    })?;

    validate_prompt(&definition)?;

    tracing::debug!("Loaded prompt '{}'", definition.id);
    Ok(definition)
}

/// A template that never mentions the question cannot answer it.
fn validate_prompt(definition: &PromptDefinition) -> AppResult<()> {
    if definition.id.trim().is_empty() {
        return Err(AppError::Prompt("Prompt id is empty".to_string()));
    }

    if !definition.template.contains("{{question}}") {
        return Err(AppError::Prompt(format!(
            "Prompt '{}' template does not reference {{{{question}}}}",
            definition.id
        )));
    }

    Ok(())
}
