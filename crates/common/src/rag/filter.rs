//! Relevance Filter - asks the language model which chunks answer the question
//!
//! Filtering is advisory: a response that cannot be read as a JSON array
//! keeps every chunk. An empty array is a real answer and drops them all.

use crate::backend::ChatBackend;
use crate::errors::{AppError, Result};
use crate::models::{EvidenceChunk, Message};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

const FILTER_INSTRUCTIONS: &str = "You judge whether retrieved document chunks are relevant to a question.\n\
Respond with ONLY a JSON array containing the indices of the relevant chunks, for example [0, 2].\n\
Respond with [] if none of the chunks are relevant. Do not add any other text.";

/// Selects the retrieved chunks that are relevant to the original question
pub struct RelevanceFilter {
    llm: Arc<dyn ChatBackend>,
}

impl RelevanceFilter {
    pub fn new(llm: Arc<dyn ChatBackend>) -> Self {
        Self { llm }
    }

    /// Keep the chunks the backend marks relevant, in the order it lists them.
    ///
    /// No backend call is made for an empty list. Backend errors are
    /// returned; unreadable responses keep every chunk.
    pub async fn filter_chunks(
        &self,
        question: &str,
        chunks: &[EvidenceChunk],
    ) -> Result<Vec<EvidenceChunk>> {
        match self.judge_relevance(question, chunks).await {
            Err(AppError::MalformedResponse { message, .. }) => {
                tracing::warn!(error = %message, "Keeping all chunks");
                Ok(chunks.to_vec())
            }
            other => other,
        }
    }

    /// Like [`filter_chunks`](Self::filter_chunks), but an unreadable
    /// response is returned as [`AppError::MalformedResponse`].
    pub async fn judge_relevance(
        &self,
        question: &str,
        chunks: &[EvidenceChunk],
    ) -> Result<Vec<EvidenceChunk>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let listing: Vec<String> = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("[Chunk {}]: {}", i, chunk.content))
            .collect();

        let messages = vec![
            Message::system(FILTER_INSTRUCTIONS),
            Message::user(format!(
                "Question: {}\n\nChunks:\n{}\n\nReturn the JSON array of relevant chunk indices.",
                question,
                listing.join("\n\n")
            )),
        ];

        let completion = self.llm.complete(&messages).await?;

        let Some(indices) = parse_indices(&completion.content, chunks.len()) else {
            return Err(AppError::malformed(
                self.llm.name(),
                format!(
                    "relevance filter output is not a JSON index array: {}",
                    completion.content.chars().take(200).collect::<String>()
                ),
            ));
        };

        tracing::debug!(
            kept = indices.len(),
            total = chunks.len(),
            "Relevance filter applied"
        );
        Ok(indices.into_iter().map(|i| chunks[i].clone()).collect())
    }
}

/// Read the backend output as a JSON array of chunk indices.
///
/// Returns `None` unless the output is a JSON array. Entries that are not
/// non-negative integers below `len` are dropped, as are repeats.
fn parse_indices(output: &str, len: usize) -> Option<Vec<usize>> {
    let trimmed = output
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) else {
        return None;
    };

    let mut seen = HashSet::new();
    Some(
        items
            .iter()
            .filter_map(Value::as_u64)
            .filter_map(|i| usize::try_from(i).ok())
            .filter(|&i| i < len && seen.insert(i))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    fn chunks(contents: &[&str]) -> Vec<EvidenceChunk> {
        contents
            .iter()
            .enumerate()
            .map(|(i, c)| EvidenceChunk::new(*c).with_source(format!("doc{}.pdf", i)))
            .collect()
    }

    async fn run_filter(reply: &str, input: &[EvidenceChunk]) -> Vec<EvidenceChunk> {
        let llm = Arc::new(MockBackend::new("llm").with_reply(reply));
        RelevanceFilter::new(llm)
            .filter_chunks("test question", input)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_filters_relevant_chunks() {
        let input = chunks(&["Relevant chunk A", "Irrelevant chunk B", "Relevant chunk C"]);
        let result = run_filter("[0, 2]", &input).await;
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].content, "Relevant chunk A");
        assert_eq!(result[1].content, "Relevant chunk C");
    }

    #[tokio::test]
    async fn test_prompt_lists_chunks_and_question() {
        let llm = Arc::new(MockBackend::new("llm").with_reply("[0]"));
        let input = chunks(&["alpha", "beta"]);
        RelevanceFilter::new(llm.clone())
            .filter_chunks("What is alpha?", &input)
            .await
            .unwrap();

        let user_msg = &llm.last_call().unwrap()[1].content;
        assert!(user_msg.contains("[Chunk 0]: alpha"));
        assert!(user_msg.contains("[Chunk 1]: beta"));
        assert!(user_msg.contains("What is alpha?"));
    }

    #[tokio::test]
    async fn test_empty_chunks_makes_no_call() {
        let llm = Arc::new(MockBackend::new("llm"));
        let result = RelevanceFilter::new(llm.clone())
            .filter_chunks("question", &[])
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_response_returns_all_chunks() {
        let input = chunks(&["chunk A", "chunk B"]);
        assert_eq!(run_filter("not a valid json array", &input).await, input);
        assert_eq!(run_filter(r#"{"relevant": [0]}"#, &input).await, input);
        assert_eq!(run_filter("1", &input).await, input);
    }

    #[tokio::test]
    async fn test_out_of_range_indices_are_ignored() {
        let input = chunks(&["chunk A", "chunk B"]);
        let result = run_filter("[0, 5, -1]", &input).await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].content, "chunk A");
    }

    #[tokio::test]
    async fn test_non_integer_entries_are_ignored() {
        let input = chunks(&["chunk A", "chunk B", "chunk C"]);
        let result = run_filter(r#"[1, "2", 0.5, null, 2]"#, &input).await;
        let contents: Vec<_> = result.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["chunk B", "chunk C"]);
    }

    #[tokio::test]
    async fn test_empty_array_response() {
        let input = chunks(&["chunk A"]);
        assert!(run_filter("[]", &input).await.is_empty());
    }

    #[tokio::test]
    async fn test_returned_order_is_preserved() {
        let input = chunks(&["A", "B", "C"]);
        let result = run_filter("[2, 0, 2]", &input).await;
        let contents: Vec<_> = result.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["C", "A"]);
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let llm = Arc::new(MockBackend::new("llm").with_error("down"));
        let result = RelevanceFilter::new(llm)
            .filter_chunks("q", &chunks(&["A"]))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_judge_relevance_reports_unreadable_output() {
        let llm = Arc::new(MockBackend::new("llm").with_reply("chunk 0 looks good"));
        let err = RelevanceFilter::new(llm)
            .judge_relevance("q", &chunks(&["A", "B"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse { .. }));
    }

    #[test]
    fn test_parse_fenced_array() {
        assert_eq!(parse_indices("```json\n[1, 0]\n```", 2), Some(vec![1, 0]));
        assert_eq!(parse_indices("  [0]  ", 1), Some(vec![0]));
        assert_eq!(parse_indices("Relevant: [0]", 1), None);
    }
}
