//! HTTP chat-completion client for deployment endpoints

use super::{ChatBackend, ChatCompletion};
use crate::config::RagConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::{EvidenceChunk, Message};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoffBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// Chat-completion client bound to one deployment.
///
/// The inner `reqwest::Client` pools connections and is safe to share
/// between concurrent requests, so one instance serves the whole process.
pub struct HttpChatBackend {
    client: reqwest::Client,
    name: String,
    url: String,
    api_token: String,
    model: String,
    timeout: Duration,
    max_retries: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,

    #[serde(default)]
    extensions: Option<Value>,

    /// Some deployments put evidence at the top level instead
    #[serde(default)]
    citations: Option<Value>,
}

#[derive(Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatMessageResponse>,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

impl HttpChatBackend {
    /// Create a client for `deployment_id` under the configured endpoint
    pub fn new(config: &RagConfig, deployment_id: &str, name: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            name: name.to_string(),
            url: format!("{}/chat/completions", config.deployment_url(deployment_id)),
            api_token: config.api_token.clone(),
            model: config.model.clone(),
            timeout: config.timeout(),
            max_retries: config.max_retries,
        })
    }

    /// Single attempt; errors are classified for the retry policy
    async fn send_once(
        &self,
        messages: &[Message],
    ) -> std::result::Result<ChatCompletion, backoff::Error<AppError>> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let transient = e.is_timeout() || e.is_connect() || e.is_request();
                let err = AppError::backend(&self.name, format!("Request failed: {}", e));
                if transient {
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = AppError::backend(&self.name, format!("API error {}: {}", status, body));
            return if status.is_server_error() || status.as_u16() == 429 {
                Err(backoff::Error::transient(err))
            } else {
                Err(backoff::Error::permanent(err))
            };
        }

        let body = response.text().await.map_err(|e| {
            backoff::Error::transient(AppError::backend(
                &self.name,
                format!("Failed to read response body: {}", e),
            ))
        })?;

        parse_completion(&self.name, &body).map_err(backoff::Error::permanent)
    }
}

/// Decode a chat-completion response body
pub(crate) fn parse_completion(backend: &str, body: &str) -> Result<ChatCompletion> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| AppError::malformed(backend, format!("Failed to parse response: {}", e)))?;

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .unwrap_or_default();

    let citations = response
        .extensions
        .as_ref()
        .and_then(|ext| ext.get("citations"))
        .or(response.citations.as_ref())
        .map(EvidenceChunk::list_from_value)
        .unwrap_or_default();

    Ok(ChatCompletion { content, citations })
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn complete(&self, messages: &[Message]) -> Result<ChatCompletion> {
        let start = Instant::now();
        let max_retries = self.max_retries;

        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(250))
            .with_max_elapsed_time(Some(self.timeout * (max_retries + 1)))
            .build();

        let attempts = AtomicU32::new(0);
        let attempts = &attempts;

        let result = retry(policy, move || async move {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed);
            self.send_once(messages).await.map_err(|e| match e {
                backoff::Error::Transient { err, .. } if attempt < max_retries => {
                    tracing::warn!(
                        backend = %self.name,
                        attempt = attempt + 1,
                        max_retries = max_retries,
                        error = %err,
                        "Backend call failed, retrying"
                    );
                    backoff::Error::transient(err)
                }
                backoff::Error::Transient { err, .. } => backoff::Error::permanent(err),
                permanent => permanent,
            })
        })
        .await;

        metrics::record_backend_call(start.elapsed().as_secs_f64(), &self.name, result.is_ok());

        if let Ok(completion) = &result {
            tracing::debug!(
                backend = %self.name,
                messages = messages.len(),
                citations = completion.citations.len(),
                latency_ms = start.elapsed().as_millis() as u64,
                "Backend call completed"
            );
        }

        result
    }

    fn name(&self) -> &str {
        &self.name
    }
}
