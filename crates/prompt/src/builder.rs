//! Prompt builder for rendering templates with retrieved context.

use crate::types::{BuiltPrompt, PromptChunk, PromptDefinition};
use handlebars::Handlebars;
use medrag_core::{AppError, AppResult};
use serde::Serialize;

#[derive(Serialize)]
struct TemplateVars<'a> {
    question: &'a str,
    chunks: &'a [PromptChunk],
}

/// Build a prompt from a definition, the question and its context chunks.
///
/// # Example
/// ```no_run
/// use medrag_prompt::{build_prompt, PromptChunk, PromptDefinition};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let chunks = vec![PromptChunk {
///     source: "oncology.pdf".to_string(),
///     page: 3,
///     text: "TNM staging describes tumor, node and metastasis.".to_string(),
/// }];
/// let built = build_prompt(&PromptDefinition::default(), "What is TNM?", &chunks)?;
/// println!("{}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    question: &str,
    chunks: &[PromptChunk],
) -> AppResult<BuiltPrompt> {
    tracing::debug!(
        "Building prompt '{}' with {} context chunks",
        definition.id,
        chunks.len()
    );

    let user = render_template(&definition.template, &TemplateVars { question, chunks })?;

    Ok(BuiltPrompt {
        system: definition.system.clone(),
        user,
        prompt_id: definition.id.clone(),
    })
}

fn render_template(template: &str, vars: &TemplateVars<'_>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text output, never HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", vars)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
