//! Simple pipeline - a single retrieval call, references appended unfiltered

use super::{EvidenceRetriever, PipelineResult};
use crate::backend::ChatBackend;
use crate::errors::Result;
use crate::metrics;
use crate::models::Message;
use std::sync::Arc;

/// Retrieval-only pipeline used when no language-model deployment is configured
pub struct SimplePipeline {
    retriever: EvidenceRetriever,
    system_prompt: Option<String>,
}

impl SimplePipeline {
    pub fn new(rag: Arc<dyn ChatBackend>, system_prompt: Option<String>) -> Self {
        Self {
            retriever: EvidenceRetriever::new(rag),
            system_prompt,
        }
    }

    /// Answer text with the formatted references appended
    pub async fn simple_query(
        &self,
        question: &str,
        history: Option<&[Message]>,
    ) -> Result<String> {
        let retrieval = self
            .retriever
            .retrieve(question, history, self.system_prompt.as_deref())
            .await?;

        let retrieved = retrieval.chunks.len();
        metrics::record_chunks(retrieved, retrieved);

        Ok(PipelineResult::compose(retrieval.answer, &retrieval.chunks).text)
    }
}
