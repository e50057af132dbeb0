//! Query Optimizer - rewrites questions into search queries

use crate::backend::ChatBackend;
use crate::errors::Result;
use crate::models::Message;
use std::sync::Arc;

const OPTIMIZE_INSTRUCTIONS: &str = "You rewrite user questions into search queries for a document retrieval system.\n\
Rules:\n\
- Remove filler words, greetings and politeness phrases.\n\
- Keep the key entities and add close synonyms or alternative terms that improve recall.\n\
- Resolve pronouns and references such as \"it\" or \"that plan\" using the recent conversation, when one is given.\n\
- Keep the language of the original question.\n\
- Output only the rewritten query, without explanations or quotes.";

/// Rewrites a raw question, optionally using recent turns for context
pub struct QueryOptimizer {
    llm: Arc<dyn ChatBackend>,
    history_window: usize,
}

impl QueryOptimizer {
    pub fn new(llm: Arc<dyn ChatBackend>, history_window: usize) -> Self {
        Self { llm, history_window }
    }

    /// Produce a search-optimized query.
    ///
    /// A blank rewrite yields the original question. Backend errors are
    /// returned to the caller.
    pub async fn optimize_query(
        &self,
        question: &str,
        history: Option<&[Message]>,
    ) -> Result<String> {
        let messages = vec![
            Message::system(OPTIMIZE_INSTRUCTIONS),
            Message::user(self.build_prompt(question, history)),
        ];

        let completion = self.llm.complete(&messages).await?;
        let rewritten = completion.content.trim();

        if rewritten.is_empty() {
            tracing::debug!("Optimizer returned an empty query, keeping the original");
            return Ok(question.to_string());
        }

        tracing::debug!(original = %question, optimized = %rewritten, "Query optimized");
        Ok(rewritten.to_string())
    }

    fn build_prompt(&self, question: &str, history: Option<&[Message]>) -> String {
        let recent = match history {
            Some(history) if !history.is_empty() => history,
            _ => return question.to_string(),
        };

        let skip = recent.len().saturating_sub(self.history_window);
        let lines: Vec<String> = recent[skip..]
            .iter()
            .map(|msg| format!("{}: {}", msg.role.as_str(), msg.content))
            .collect();

        format!(
            "Recent conversation:\n{}\n\nCurrent question: {}",
            lines.join("\n"),
            question
        )
    }
}
