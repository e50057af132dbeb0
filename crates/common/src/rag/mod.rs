//! Retrieval-augmented answering pipeline
//!
//! Two pipelines share the same building blocks:
//! - Simple: retrieval backend only, answer plus formatted references
//! - Advanced: query optimization, retrieval, relevance filtering and
//!   grounded synthesis, degrading stage by stage when the language-model
//!   backend misbehaves
//!
//! [`RagService`] picks one of them once, from configuration, and exposes
//! the caller-facing entry points.

mod citations;
mod filter;
mod optimizer;
mod orchestrator;
mod retriever;
mod service;
mod simple;
mod synthesizer;

pub use citations::{format_citations, CITATION_PREVIEW_CHARS};
pub use filter::RelevanceFilter;
pub use optimizer::QueryOptimizer;
pub use orchestrator::{AdvancedPipeline, Stage, StageOutcome};
pub use retriever::{EvidenceRetriever, Retrieval};
pub use service::{Pipeline, PipelineRequest, PipelineResult, RagService};
pub use simple::SimplePipeline;
pub use synthesizer::AnswerSynthesizer;

use crate::models::Message;

/// History turns that may be forwarded to a backend.
///
/// System messages are dropped so the component's own system message
/// stays the only one, and first.
pub(crate) fn conversation_turns<'a>(
    history: Option<&'a [Message]>,
) -> impl Iterator<Item = &'a Message> {
    history
        .unwrap_or_default()
        .iter()
        .filter(|msg| !msg.is_system())
}
