//! Answer Synthesizer - generates a grounded answer from filtered evidence

use super::conversation_turns;
use crate::backend::ChatBackend;
use crate::errors::Result;
use crate::models::{EvidenceChunk, Message};
use std::sync::Arc;

const SYNTHESIS_INSTRUCTIONS: &str = "You answer questions using only the provided context.\n\
- Base every statement on the context and do not add outside knowledge.\n\
- Cite sources with numbered markers such as [1] or [2] that match the numbers of the context entries.\n\
- If the context does not contain enough information to answer, say so honestly.\n\
- Answer in the same language as the question.\n\
- Be concise.";

const CONTEXT_DIVIDER: &str = "\n\n---\n\n";

/// Produces the final answer text with citation markers
pub struct AnswerSynthesizer {
    llm: Arc<dyn ChatBackend>,
    system_prompt: Option<String>,
}

impl AnswerSynthesizer {
    /// `system_prompt` is prepended to the built-in synthesis instructions
    pub fn new(llm: Arc<dyn ChatBackend>, system_prompt: Option<String>) -> Self {
        Self { llm, system_prompt }
    }

    /// Answer `question` from `chunks`; backend errors are returned
    pub async fn generate_answer(
        &self,
        question: &str,
        chunks: &[EvidenceChunk],
        history: Option<&[Message]>,
    ) -> Result<String> {
        let mut messages = vec![Message::system(self.instructions())];
        messages.extend(conversation_turns(history).cloned());
        messages.push(Message::user(format!(
            "Context:\n{}\n\nQuestion: {}",
            build_context(chunks),
            question
        )));

        let completion = self.llm.complete(&messages).await?;

        tracing::debug!(
            chunks = chunks.len(),
            answer_len = completion.content.len(),
            "Answer synthesized"
        );

        Ok(completion.content)
    }

    fn instructions(&self) -> String {
        match &self.system_prompt {
            Some(custom) => format!("{}\n\n{}", custom, SYNTHESIS_INSTRUCTIONS),
            None => SYNTHESIS_INSTRUCTIONS.to_string(),
        }
    }
}

/// Numbered context block: `[i] Source: <source>[, p.<page>]` then the full content
fn build_context(chunks: &[EvidenceChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let mut reference = format!("[{}] Source: {}", i + 1, chunk.source_label());
            if let Some(page) = chunk.page() {
                reference.push_str(&format!(", p.{}", page));
            }
            format!("{}\n{}", reference, chunk.content)
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_DIVIDER)
}
