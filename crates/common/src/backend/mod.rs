//! Chat-completion backend abstraction
//!
//! Both the retrieval deployment and the language-model deployment speak
//! the same OpenAI-style chat-completion contract. Components hold an
//! `Arc<dyn ChatBackend>` so they can be driven by the HTTP client in
//! production and by [`MockBackend`] in tests.

mod http;
mod mock;

pub use http::HttpChatBackend;
pub use mock::MockBackend;

use crate::config::RagConfig;
use crate::errors::Result;
use crate::models::{EvidenceChunk, Message};
use async_trait::async_trait;
use std::sync::Arc;

/// Backend name used for the retrieval deployment
pub const RETRIEVAL_BACKEND: &str = "retrieval";
/// Backend name used for the language-model deployment
pub const LLM_BACKEND: &str = "llm";

/// Result of one non-streaming chat completion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatCompletion {
    /// Message content of the first choice, empty if none
    pub content: String,

    /// Evidence carried in the response extension data
    pub citations: Vec<EvidenceChunk>,
}

impl ChatCompletion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            citations: Vec::new(),
        }
    }

    pub fn with_citations(mut self, citations: Vec<EvidenceChunk>) -> Self {
        self.citations = citations;
        self
    }
}

/// Trait for chat-completion backends
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Run one non-streaming completion over the given messages
    async fn complete(&self, messages: &[Message]) -> Result<ChatCompletion>;

    /// Name used in logs and metrics
    fn name(&self) -> &str;
}

/// Create an HTTP backend for a deployment
pub fn create_backend(
    config: &RagConfig,
    deployment_id: &str,
    name: &str,
) -> Result<Arc<dyn ChatBackend>> {
    let backend = HttpChatBackend::new(config, deployment_id, name)?;
    tracing::info!(
        backend = name,
        deployment_id = deployment_id,
        "Chat backend configured"
    );
    Ok(Arc::new(backend))
}
