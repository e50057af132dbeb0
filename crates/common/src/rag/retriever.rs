//! Evidence Retriever - asks the retrieval backend for a draft answer and passages

use super::conversation_turns;
use crate::backend::ChatBackend;
use crate::errors::Result;
use crate::models::{EvidenceChunk, Message};
use std::sync::Arc;

/// Draft answer and raw evidence from one retrieval call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieval {
    pub answer: String,
    pub chunks: Vec<EvidenceChunk>,
}

/// Client for the retrieval deployment
pub struct EvidenceRetriever {
    backend: Arc<dyn ChatBackend>,
}

impl EvidenceRetriever {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// Send `query` as the final user turn, after the optional system
    /// prompt and conversation history. Chunks are returned unformatted.
    pub async fn retrieve(
        &self,
        query: &str,
        history: Option<&[Message]>,
        system_prompt: Option<&str>,
    ) -> Result<Retrieval> {
        let mut messages = Vec::new();
        if let Some(prompt) = system_prompt {
            messages.push(Message::system(prompt));
        }
        messages.extend(conversation_turns(history).cloned());
        messages.push(Message::user(query));

        tracing::info!(
            backend = %self.backend.name(),
            history_len = messages.len() - 1 - usize::from(system_prompt.is_some()),
            "Sending query to retrieval deployment"
        );

        let completion = self.backend.complete(&messages).await?;

        tracing::debug!(
            chunks = completion.citations.len(),
            answer_len = completion.content.len(),
            "Retrieval completed"
        );

        Ok(Retrieval {
            answer: completion.content,
            chunks: completion.citations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChatCompletion, MockBackend};
    use crate::models::Role;

    #[tokio::test]
    async fn test_retrieve_returns_answer_and_chunks() {
        let chunks = vec![EvidenceChunk::new("Relevant passage")
            .with_source("manual.pdf")
            .with_page("5")];
        let rag = Arc::new(MockBackend::new("retrieval").with_completion(
            ChatCompletion::text("Answer text").with_citations(chunks.clone()),
        ));

        let retrieval = EvidenceRetriever::new(rag.clone())
            .retrieve("question", None, None)
            .await
            .unwrap();

        assert_eq!(retrieval.answer, "Answer text");
        assert_eq!(retrieval.chunks, chunks);

        let messages = rag.last_call().unwrap();
        assert_eq!(messages, vec![Message::user("question")]);
    }

    #[tokio::test]
    async fn test_message_order() {
        let rag = Arc::new(MockBackend::new("retrieval").with_reply("ok"));
        let history = vec![
            Message::user("Hello"),
            Message::system("sneaky"),
            Message::assistant("Hi there!"),
        ];

        EvidenceRetriever::new(rag.clone())
            .retrieve("Follow-up question", Some(&history), Some("You are a helpful assistant."))
            .await
            .unwrap();

        let messages = rag.last_call().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("helpful assistant"));
        assert_eq!(messages[1].content, "Hello");
        assert_eq!(messages[2].content, "Hi there!");
        assert_eq!(messages[3], Message::user("Follow-up question"));
        assert_eq!(messages.iter().filter(|m| m.is_system()).count(), 1);
    }

    #[tokio::test]
    async fn test_missing_citations_is_empty() {
        let rag = Arc::new(MockBackend::new("retrieval").with_reply("no evidence"));
        let retrieval = EvidenceRetriever::new(rag)
            .retrieve("q", None, None)
            .await
            .unwrap();
        assert!(retrieval.chunks.is_empty());
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let rag = Arc::new(MockBackend::new("retrieval").with_error("unavailable"));
        let result = EvidenceRetriever::new(rag).retrieve("q", None, None).await;
        assert!(result.is_err());
    }
}
