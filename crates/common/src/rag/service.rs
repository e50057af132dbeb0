//! Caller-facing entry points
//!
//! [`RagService`] is built once at startup. It decides between the simple
//! and advanced pipelines from configuration and never re-reads it.

use super::{format_citations, AdvancedPipeline, SimplePipeline};
use crate::backend::{create_backend, ChatBackend, LLM_BACKEND, RETRIEVAL_BACKEND};
use crate::config::{PipelineMode, RagConfig, RAG_DEPLOYMENT_ID_KEY};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::{parse_history, EvidenceChunk, Message};
use std::sync::Arc;
use std::time::Instant;

/// Question plus the conversation so far
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    pub question: String,
    pub history: Vec<Message>,
}

impl PipelineRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    /// History slice, or `None` when there is none
    pub fn history(&self) -> Option<&[Message]> {
        if self.history.is_empty() {
            None
        } else {
            Some(&self.history)
        }
    }
}

/// Final answer text, references included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    pub text: String,
}

impl PipelineResult {
    /// Append the references block for `chunks` to `answer`
    pub fn compose(answer: String, chunks: &[EvidenceChunk]) -> Self {
        let mut text = answer;
        text.push_str(&format_citations(chunks));
        Self { text }
    }
}

/// Pipeline chosen at startup
pub enum Pipeline {
    Simple(SimplePipeline),
    Advanced(AdvancedPipeline),
}

impl Pipeline {
    pub fn mode(&self) -> PipelineMode {
        match self {
            Pipeline::Simple(_) => PipelineMode::Simple,
            Pipeline::Advanced(_) => PipelineMode::Advanced,
        }
    }

    /// Final answer text for `request`
    pub async fn run(&self, request: &PipelineRequest) -> Result<String> {
        match self {
            Pipeline::Simple(pipeline) => {
                pipeline
                    .simple_query(&request.question, request.history())
                    .await
            }
            Pipeline::Advanced(pipeline) => pipeline
                .run(&request.question, request.history())
                .await
                .map(|result| result.text),
        }
    }
}

/// Question-answering service over the configured deployments
pub struct RagService {
    pipeline: Option<Pipeline>,
}

impl RagService {
    /// Build the backends described by `config`.
    ///
    /// A missing retrieval deployment is not an error here: the service
    /// starts unconfigured and answers every query with the configuration
    /// message.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let (Some(mode), Some(rag_id)) = (config.pipeline_mode(), config.deployment_id()) else {
            tracing::warn!(
                key = RAG_DEPLOYMENT_ID_KEY,
                "Retrieval deployment not configured, queries will be rejected"
            );
            return Ok(Self::unconfigured());
        };

        let rag = create_backend(config, rag_id, RETRIEVAL_BACKEND)?;
        let llm = match (mode, config.llm_deployment_id()) {
            (PipelineMode::Advanced, Some(llm_id)) => {
                Some(create_backend(config, llm_id, LLM_BACKEND)?)
            }
            _ => None,
        };

        Ok(Self::with_backends(
            rag,
            llm,
            config.system_prompt().map(str::to_string),
            config.history_window,
        ))
    }

    /// Assemble a service from already-built backends
    pub fn with_backends(
        rag: Arc<dyn ChatBackend>,
        llm: Option<Arc<dyn ChatBackend>>,
        system_prompt: Option<String>,
        history_window: usize,
    ) -> Self {
        let pipeline = match llm {
            Some(llm) => Pipeline::Advanced(AdvancedPipeline::new(
                rag,
                llm,
                system_prompt,
                history_window,
            )),
            None => Pipeline::Simple(SimplePipeline::new(rag, system_prompt)),
        };

        tracing::info!(mode = pipeline.mode().as_str(), "RAG pipeline selected");

        Self {
            pipeline: Some(pipeline),
        }
    }

    /// Service with no retrieval deployment
    pub fn unconfigured() -> Self {
        Self { pipeline: None }
    }

    pub fn mode(&self) -> Option<PipelineMode> {
        self.pipeline.as_ref().map(Pipeline::mode)
    }

    /// Answer a standalone question
    pub async fn query(&self, question: &str) -> Result<String> {
        self.execute(PipelineRequest::new(question)).await
    }

    /// Answer a question in the context of a JSON-encoded conversation.
    ///
    /// Malformed `history_json` is treated as an empty conversation.
    pub async fn query_with_context(&self, question: &str, history_json: &str) -> Result<String> {
        let history = parse_history(history_json);
        tracing::debug!(history_len = history.len(), "Conversation history parsed");
        self.execute(PipelineRequest::new(question).with_history(history))
            .await
    }

    async fn execute(&self, request: PipelineRequest) -> Result<String> {
        let Some(pipeline) = &self.pipeline else {
            let error = AppError::Configuration {
                key: RAG_DEPLOYMENT_ID_KEY.to_string(),
            };
            return Ok(format!("Error: {}", error));
        };

        let mode = pipeline.mode();
        let start = Instant::now();
        let result = pipeline.run(&request).await;
        metrics::record_pipeline(start.elapsed().as_secs_f64(), mode.as_str(), result.is_ok());

        match result {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::error!(mode = mode.as_str(), error = %e, "Pipeline failed");
                Err(e)
            }
        }
    }
}
