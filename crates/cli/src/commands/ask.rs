//! Ask command handler.
//!
//! Answers one question from every collection and prints the selected answer.

use crate::commands::print_json;
use clap::Args;
use medrag_core::{config::AppConfig, AppError, AppResult};
use medrag_knowledge::AppContext;

/// Ask a medical question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Output as JSON, including per-collection outcomes
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        if self.question.trim().is_empty() {
            return Err(AppError::Config("No question provided".to_string()));
        }

        let context = AppContext::initialize(config.clone()).await?;
        let answer = context.answer(&self.question).await;

        tracing::debug!(
            "Selected: {}",
            answer.selected.as_deref().unwrap_or("fallback")
        );

        if self.json {
            print_json(&answer)?;
        } else {
            println!("{}", answer.answer);

            if let Some(outcome) = answer
                .outcomes
                .iter()
                .find(|o| Some(&o.collection) == answer.selected.as_ref())
            {
                if !outcome.sources.is_empty() {
                    println!();
                    println!("Sources ({}):", outcome.collection);
                    for source in &outcome.sources {
                        println!(
                            "- {}, page {} (score {:.3})",
                            source.source,
                            source.page + 1,
                            source.score
                        );
                    }
                }
            }
        }

        Ok(())
    }
}
