//! Prompt types for MedRAG.

use serde::{Deserialize, Serialize};

const DEFAULT_SYSTEM: &str = "You are a careful medical reference assistant. \
Answer strictly from the supplied document excerpts.";

const DEFAULT_TEMPLATE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.

{{#each chunks}}
[{{this.source}}, page {{this.page}}]
{{this.text}}

{{/each}}
Question: {{question}}
Helpful Answer:";

/// A prompt definition, loaded from YAML or built in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptDefinition {
    /// Prompt identifier
    pub id: String,

    /// System message sent ahead of the user prompt
    #[serde(default)]
    pub system: Option<String>,

    /// Handlebars template receiving `question` and `chunks`
    pub template: String,
}

impl Default for PromptDefinition {
    fn default() -> Self {
        Self {
            id: "medrag.stuff.default".to_string(),
            system: Some(DEFAULT_SYSTEM.to_string()),
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// A retrieved chunk as exposed to the template.
#[derive(Debug, Clone, Serialize)]
pub struct PromptChunk {
    /// Document the chunk was cut from
    pub source: String,

    /// 1-based page number for display
    pub page: u32,

    pub text: String,
}

/// A rendered prompt ready for the generation model.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPrompt {
    pub system: Option<String>,
    pub user: String,
    pub prompt_id: String,
}
