//! Dual-index answer arbitration.
//!
//! Every collection answers the same question concurrently. Answers that are
//! empty or contain a refusal phrase are discarded; of the rest, the longest
//! wins and ties go to the collection configured first. When nothing is
//! informative the fallback message is returned.

use crate::rag::pipeline::AnswerSource;
use crate::rag::types::{ArbitratedAnswer, CollectionOutcome, QueryResult};
use futures::future::join_all;
use medrag_core::config::ArbitrationSettings;
use medrag_core::AppResult;
use std::sync::Arc;

/// Decides whether an answer carries information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InformativenessPolicy {
    /// Lowercased refusal phrases
    phrases: Vec<String>,
}

impl InformativenessPolicy {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// An answer is informative when it is not blank and contains none of the
    /// refusal phrases (case-insensitive substring match).
    pub fn is_informative(&self, answer: &str) -> bool {
        if answer.trim().is_empty() {
            return false;
        }

        let lower = answer.to_lowercase();
        !self.phrases.iter().any(|phrase| lower.contains(phrase.as_str()))
    }
}

impl Default for InformativenessPolicy {
    fn default() -> Self {
        Self::new(ArbitrationSettings::default().refusal_phrases)
    }
}

/// Pick the winning answer.
///
/// Returns the index of the longest informative answer (by character count),
/// preferring the earliest on ties, or `None` when no answer is informative.
pub fn select(answers: &[&str], policy: &InformativenessPolicy) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;

    for (i, answer) in answers.iter().enumerate() {
        if !policy.is_informative(answer) {
            continue;
        }

        let len = answer.chars().count();
        if best.map_or(true, |(_, best_len)| len > best_len) {
            best = Some((i, len));
        }
    }

    best.map(|(i, _)| i)
}

/// Fans a question out to every collection and arbitrates the answers.
pub struct Arbitrator {
    sources: Vec<Arc<dyn AnswerSource>>,
    policy: InformativenessPolicy,
    fallback_message: String,
}

impl Arbitrator {
    pub fn new(
        sources: Vec<Arc<dyn AnswerSource>>,
        policy: InformativenessPolicy,
        fallback_message: impl Into<String>,
    ) -> Self {
        Self {
            sources,
            policy,
            fallback_message: fallback_message.into(),
        }
    }

    pub fn from_settings(
        sources: Vec<Arc<dyn AnswerSource>>,
        settings: &ArbitrationSettings,
    ) -> Self {
        Self::new(
            sources,
            InformativenessPolicy::new(&settings.refusal_phrases),
            settings.fallback_message.clone(),
        )
    }

    pub fn fallback_message(&self) -> &str {
        &self.fallback_message
    }

    /// Answer a question from every collection and choose one answer.
    ///
    /// Collection failures never propagate; they become non-informative
    /// outcomes.
    pub async fn answer(&self, question: &str) -> ArbitratedAnswer {
        let queries = self.sources.iter().map(|source| async move {
            let result = source.query(question).await;
            (source.name().to_string(), result)
        });

        let outcomes = join_all(queries)
            .await
            .into_iter()
            .map(|(name, result)| self.outcome(name, result))
            .collect();

        self.arbitrate(outcomes)
    }

    /// Answer a question, returning only the chosen text.
    pub async fn answer_text(&self, question: &str) -> String {
        self.answer(question).await.answer
    }

    /// Apply the selection rule to already collected outcomes.
    pub fn arbitrate(&self, outcomes: Vec<CollectionOutcome>) -> ArbitratedAnswer {
        let answers: Vec<&str> = outcomes
            .iter()
            .map(|o| {
                if o.error.is_some() {
                    ""
                } else {
                    o.answer.as_str()
                }
            })
            .collect();

        match select(&answers, &self.policy) {
            Some(i) => {
                let selected = outcomes[i].collection.clone();
                tracing::info!(selected = %selected, "Arbitration selected collection answer");
                ArbitratedAnswer {
                    answer: outcomes[i].answer.clone(),
                    selected: Some(selected),
                    outcomes,
                }
            }
            None => {
                tracing::info!(selected = "fallback", "No informative answer from any collection");
                ArbitratedAnswer {
                    answer: self.fallback_message.clone(),
                    selected: None,
                    outcomes,
                }
            }
        }
    }

    fn outcome(&self, collection: String, result: AppResult<QueryResult>) -> CollectionOutcome {
        match result {
            Ok(result) => CollectionOutcome {
                informative: self.policy.is_informative(&result.answer),
                collection,
                answer: result.answer,
                sources: result.sources,
                error: None,
            },
            Err(e) => {
                tracing::warn!(
                    collection = %collection,
                    kind = e.kind(),
                    "Collection query failed: {}",
                    e
                );
                CollectionOutcome {
                    collection,
                    answer: String::new(),
                    informative: false,
                    sources: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
