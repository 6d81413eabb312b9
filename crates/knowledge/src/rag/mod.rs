//! RAG (Retrieval-Augmented Generation) answering over several collections.
//!
//! Each collection has its own retrieval-answer pipeline; the arbitrator runs
//! them side by side and returns one answer.

pub mod arbitrator;
pub mod pipeline;
pub mod types;

pub use arbitrator::{select, Arbitrator, InformativenessPolicy};
pub use pipeline::{AnswerSource, CollectionPipeline, Generator, UnavailableCollection};
pub use types::{ArbitratedAnswer, CollectionOutcome, QueryResult, SourceRef};
