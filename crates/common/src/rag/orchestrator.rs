//! Advanced pipeline - optimize, retrieve, filter, synthesize
//!
//! Only retrieval is load-bearing. Every other stage reports a
//! [`StageOutcome`] and the pipeline degrades to the best answer it
//! already holds when a stage falls back:
//!
//! | failure            | result                                      |
//! |--------------------|---------------------------------------------|
//! | optimize           | retrieve with the original question          |
//! | retrieve           | error returned to the caller                 |
//! | no evidence        | retrieval answer, no references              |
//! | filter             | every chunk treated as relevant              |
//! | nothing relevant   | retrieval answer + unfiltered references     |
//! | synthesize         | retrieval answer + filtered references       |

use super::{
    AnswerSynthesizer, EvidenceRetriever, PipelineResult, QueryOptimizer, RelevanceFilter,
};
use crate::backend::ChatBackend;
use crate::errors::Result;
use crate::metrics;
use crate::models::{EvidenceChunk, Message};
use std::fmt;
use std::sync::Arc;

/// Optional stages of the advanced pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Optimize,
    Filter,
    Synthesize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Optimize => "optimize",
            Stage::Filter => "filter",
            Stage::Synthesize => "synthesize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an optional stage: its value, or the reason it was skipped
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Completed(T),
    Fallback { reason: String },
}

impl<T> StageOutcome<T> {
    /// Convert a stage result, logging and counting the outcome
    pub fn from_result(stage: Stage, result: Result<T>) -> Self {
        match result {
            Ok(value) => {
                tracing::debug!(stage = %stage, "Stage completed");
                metrics::record_stage(stage.as_str(), true);
                StageOutcome::Completed(value)
            }
            Err(e) => {
                tracing::warn!(stage = %stage, error = %e, "Stage failed, falling back");
                metrics::record_stage(stage.as_str(), false);
                StageOutcome::Fallback {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Completed value, or `fallback` when the stage was skipped
    pub fn unwrap_or(self, fallback: T) -> T {
        match self {
            StageOutcome::Completed(value) => value,
            StageOutcome::Fallback { .. } => fallback,
        }
    }
}

/// Full pipeline used when a language-model deployment is configured
pub struct AdvancedPipeline {
    optimizer: QueryOptimizer,
    retriever: EvidenceRetriever,
    filter: RelevanceFilter,
    synthesizer: AnswerSynthesizer,
    system_prompt: Option<String>,
}

impl AdvancedPipeline {
    pub fn new(
        rag: Arc<dyn ChatBackend>,
        llm: Arc<dyn ChatBackend>,
        system_prompt: Option<String>,
        history_window: usize,
    ) -> Self {
        Self {
            optimizer: QueryOptimizer::new(llm.clone(), history_window),
            retriever: EvidenceRetriever::new(rag),
            filter: RelevanceFilter::new(llm.clone()),
            synthesizer: AnswerSynthesizer::new(llm, system_prompt.clone()),
            system_prompt,
        }
    }

    pub async fn run(
        &self,
        question: &str,
        history: Option<&[Message]>,
    ) -> Result<PipelineResult> {
        let optimized = StageOutcome::from_result(
            Stage::Optimize,
            self.optimizer.optimize_query(question, history).await,
        );
        let query = optimized.unwrap_or(question.to_string());

        let retrieval = self
            .retriever
            .retrieve(&query, history, self.system_prompt.as_deref())
            .await?;
        let fallback_answer = retrieval.answer;
        let citations = retrieval.chunks;

        if citations.is_empty() {
            tracing::info!("No evidence retrieved, returning retrieval answer");
            metrics::record_chunks(0, 0);
            return Ok(PipelineResult::compose(fallback_answer, &[]));
        }

        let filtered = match self.filter_stage(question, &citations).await {
            StageOutcome::Completed(kept) => kept,
            StageOutcome::Fallback { .. } => citations.clone(),
        };
        metrics::record_chunks(citations.len(), filtered.len());

        if filtered.is_empty() {
            tracing::info!(
                retrieved = citations.len(),
                "No chunk judged relevant, returning retrieval answer"
            );
            return Ok(PipelineResult::compose(fallback_answer, &citations));
        }

        let synthesized = StageOutcome::from_result(
            Stage::Synthesize,
            self.synthesizer
                .generate_answer(question, &filtered, history)
                .await,
        );

        let answer = match synthesized {
            StageOutcome::Completed(answer) => answer,
            StageOutcome::Fallback { .. } => fallback_answer,
        };

        Ok(PipelineResult::compose(answer, &filtered))
    }

    /// The filter judges against the caller's question, not the rewrite.
    /// Unreadable filter output counts as a fallback.
    async fn filter_stage(
        &self,
        question: &str,
        citations: &[EvidenceChunk],
    ) -> StageOutcome<Vec<EvidenceChunk>> {
        StageOutcome::from_result(
            Stage::Filter,
            self.filter.judge_relevance(question, citations).await,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChatCompletion, MockBackend};
    use crate::rag::format_citations;

    fn evidence() -> Vec<EvidenceChunk> {
        vec![
            EvidenceChunk::new("Pricing starts at $100 per month.")
                .with_source("pricing.pdf")
                .with_page("3"),
            EvidenceChunk::new("The office is closed on Sundays.").with_source("hours.pdf"),
        ]
    }

    fn rag_with(answer: &str, chunks: Vec<EvidenceChunk>) -> Arc<MockBackend> {
        Arc::new(
            MockBackend::new("retrieval")
                .with_completion(ChatCompletion::text(answer).with_citations(chunks)),
        )
    }

    fn pipeline(rag: &Arc<MockBackend>, llm: &Arc<MockBackend>) -> AdvancedPipeline {
        AdvancedPipeline::new(rag.clone(), llm.clone(), None, 4)
    }

    #[tokio::test]
    async fn test_all_stages_succeed() {
        let rag = rag_with("Draft answer", evidence());
        let llm = Arc::new(
            MockBackend::new("llm")
                .with_reply("pricing plan cost")
                .with_reply("[0, 1]")
                .with_reply("Plans start at $100 [1]."),
        );

        let result = pipeline(&rag, &llm).run("How much?", None).await.unwrap();

        assert!(result.text.starts_with("Plans start at $100 [1]."));
        assert!(result.text.contains("pricing.pdf"));
        assert!(result.text.contains("hours.pdf"));
        assert!(!result.text.contains("Draft answer"));
        assert_eq!(llm.call_count(), 3);

        let retrieval_call = rag.last_call().unwrap();
        assert_eq!(retrieval_call.last().unwrap().content, "pricing plan cost");
    }

    #[tokio::test]
    async fn test_no_citations_returns_raw_answer() {
        let rag = rag_with("Raw retrieval answer", Vec::new());
        let llm = Arc::new(MockBackend::new("llm").with_reply("optimized"));

        let result = pipeline(&rag, &llm).run("question", None).await.unwrap();

        assert_eq!(result.text, "Raw retrieval answer");
        assert!(!result.text.contains("References"));
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_filter_failure_uses_unfiltered_citations() {
        let chunks = evidence();
        let rag = rag_with("Fallback answer", chunks.clone());
        let llm = Arc::new(
            MockBackend::new("llm")
                .with_reply("optimized")
                .with_error("filter failed")
                .with_error("synthesis failed"),
        );

        let result = pipeline(&rag, &llm).run("question", None).await.unwrap();

        assert_eq!(
            result.text,
            format!("Fallback answer{}", format_citations(&chunks))
        );
    }

    #[tokio::test]
    async fn test_filter_failure_still_synthesizes_from_all_chunks() {
        let rag = rag_with("Fallback answer", evidence());
        let llm = Arc::new(
            MockBackend::new("llm")
                .with_reply("optimized")
                .with_error("filter failed")
                .with_reply("Synthesized [1] [2]."),
        );

        let result = pipeline(&rag, &llm).run("question", None).await.unwrap();

        assert!(result.text.starts_with("Synthesized [1] [2]."));
        assert!(result.text.contains("[2] hours.pdf"));
    }

    #[tokio::test]
    async fn test_unreadable_filter_output_is_fallback() {
        let rag = rag_with("Draft", evidence());
        let llm = Arc::new(MockBackend::new("llm").with_reply("both look relevant"));

        let outcome = pipeline(&rag, &llm)
            .filter_stage("question", &evidence())
            .await;

        assert!(matches!(outcome, StageOutcome::Fallback { .. }));
    }

    #[tokio::test]
    async fn test_unreadable_filter_output_keeps_all_chunks() {
        let chunks = evidence();
        let rag = rag_with("Draft", chunks.clone());
        let llm = Arc::new(
            MockBackend::new("llm")
                .with_reply("optimized")
                .with_reply("both look relevant")
                .with_reply("Synthesized."),
        );

        let result = pipeline(&rag, &llm).run("question", None).await.unwrap();

        assert_eq!(result.text, format!("Synthesized.{}", format_citations(&chunks)));
    }

    #[tokio::test]
    async fn test_synthesis_failure_uses_filtered_citations() {
        let chunks = evidence();
        let rag = rag_with("Fallback answer", chunks.clone());
        let llm = Arc::new(
            MockBackend::new("llm")
                .with_reply("optimized")
                .with_reply("[1]")
                .with_error("synthesis failed"),
        );

        let result = pipeline(&rag, &llm).run("question", None).await.unwrap();

        assert_eq!(
            result.text,
            format!("Fallback answer{}", format_citations(&chunks[1..]))
        );
        assert!(!result.text.contains("pricing.pdf"));
    }

    #[tokio::test]
    async fn test_nothing_relevant_returns_unfiltered_citations() {
        let chunks = evidence();
        let rag = rag_with("Fallback answer", chunks.clone());
        let llm = Arc::new(MockBackend::new("llm").with_reply("optimized").with_reply("[]"));

        let result = pipeline(&rag, &llm).run("question", None).await.unwrap();

        assert_eq!(
            result.text,
            format!("Fallback answer{}", format_citations(&chunks))
        );
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_optimizer_failure_uses_original_question() {
        let rag = rag_with("Answer", Vec::new());
        let llm = Arc::new(MockBackend::new("llm").with_error("optimizer down"));

        let result = pipeline(&rag, &llm)
            .run("original question", None)
            .await
            .unwrap();

        assert_eq!(result.text, "Answer");
        let retrieval_call = rag.last_call().unwrap();
        assert_eq!(retrieval_call.last().unwrap().content, "original question");
    }

    #[tokio::test]
    async fn test_retrieval_failure_is_fatal() {
        let rag = Arc::new(MockBackend::new("retrieval").with_error("retrieval down"));
        let llm = Arc::new(MockBackend::new("llm").with_reply("optimized"));

        let result = pipeline(&rag, &llm).run("question", None).await;

        assert!(result.is_err());
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_filter_receives_original_question() {
        let rag = rag_with("Draft", evidence());
        let llm = Arc::new(
            MockBackend::new("llm")
                .with_reply("rewritten query")
                .with_reply("[0]")
                .with_reply("Final"),
        );

        pipeline(&rag, &llm)
            .run("What does it cost?", None)
            .await
            .unwrap();

        let calls = llm.calls();
        assert!(calls[1][1].content.contains("What does it cost?"));
        assert!(!calls[1][1].content.contains("rewritten query"));
        assert!(calls[2][calls[2].len() - 1]
            .content
            .ends_with("Question: What does it cost?"));
    }

    #[tokio::test]
    async fn test_system_prompt_reaches_retrieval_and_synthesis() {
        let rag = rag_with("Draft", evidence());
        let llm = Arc::new(
            MockBackend::new("llm")
                .with_reply("q")
                .with_reply("[0]")
                .with_reply("Final"),
        );
        let pipeline =
            AdvancedPipeline::new(rag.clone(), llm.clone(), Some("Be formal.".into()), 4);

        pipeline.run("question", None).await.unwrap();

        assert_eq!(rag.last_call().unwrap()[0], Message::system("Be formal."));
        assert!(llm.last_call().unwrap()[0].content.starts_with("Be formal."));
    }

    #[test]
    fn test_stage_outcome_from_result() {
        let ok: StageOutcome<u32> = StageOutcome::from_result(Stage::Filter, Ok(3));
        assert_eq!(ok, StageOutcome::Completed(3));

        let failed: StageOutcome<u32> = StageOutcome::from_result(
            Stage::Synthesize,
            Err(crate::errors::AppError::backend("llm", "boom")),
        );
        assert!(matches!(&failed, StageOutcome::Fallback { reason } if reason.contains("boom")));
        assert_eq!(failed.unwrap_or(7), 7);
    }
}
