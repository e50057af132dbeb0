//! Configuration management for RagForge services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - The flat service keys (RAG_DEPLOYMENT_ID, RAG_ENDPOINT, ...)
//! - Configuration files (config/default, config/<env>, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment key naming the retrieval deployment
pub const RAG_DEPLOYMENT_ID_KEY: &str = "RAG_DEPLOYMENT_ID";
/// Environment key for the backend API base URL
pub const RAG_ENDPOINT_KEY: &str = "RAG_ENDPOINT";
/// Environment key for the backend bearer token
pub const RAG_API_TOKEN_KEY: &str = "RAG_API_TOKEN";
/// Environment key naming the secondary language-model deployment
pub const LLM_DEPLOYMENT_ID_KEY: &str = "LLM_DEPLOYMENT_ID";
/// Environment key for the caller-supplied system prompt
pub const RAG_SYSTEM_PROMPT_KEY: &str = "RAG_SYSTEM_PROMPT";

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Retrieval and language-model backends
    #[serde(default)]
    pub rag: RagConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RagConfig {
    /// Retrieval deployment; nothing can be answered without it
    #[serde(default)]
    pub deployment_id: Option<String>,

    /// API base URL shared by both deployments
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bearer token for the API
    #[serde(default)]
    pub api_token: String,

    /// Language-model deployment; its presence enables the advanced pipeline
    #[serde(default)]
    pub llm_deployment_id: Option<String>,

    /// Extra system instructions sent with every backend call
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Model name sent in chat-completion requests
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,

    /// Extra attempts for transient backend failures
    #[serde(default = "default_backend_retries")]
    pub max_retries: u32,

    /// Number of trailing history messages shown to the query optimizer
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Which pipeline serves requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Retrieval only, no language-model post-processing
    Simple,
    /// Optimize, retrieve, filter, synthesize
    Advanced,
}

impl PipelineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineMode::Simple => "simple",
            PipelineMode::Advanced => "advanced",
        }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_endpoint() -> String { "http://localhost:8000/api/v2".to_string() }
fn default_model() -> String { "deployed-llm".to_string() }
fn default_backend_timeout() -> u64 { 60 }
fn default_backend_retries() -> u32 { 2 }
fn default_history_window() -> usize { 4 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_enabled() -> bool { true }

/// Read a flat environment key, treating blank values as unset
fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            // Flat service keys win over everything else
            .set_override_option("rag.deployment_id", env_value(RAG_DEPLOYMENT_ID_KEY))?
            .set_override_option("rag.endpoint", env_value(RAG_ENDPOINT_KEY))?
            .set_override_option("rag.api_token", env_value(RAG_API_TOKEN_KEY))?
            .set_override_option("rag.llm_deployment_id", env_value(LLM_DEPLOYMENT_ID_KEY))?
            .set_override_option("rag.system_prompt", env_value(RAG_SYSTEM_PROMPT_KEY))?

            .build()?;

        config.try_deserialize()
    }

    /// Grace period for in-flight requests once shutdown starts
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl RagConfig {
    /// Retrieval deployment, if set to something non-blank
    pub fn deployment_id(&self) -> Option<&str> {
        non_blank(&self.deployment_id)
    }

    /// Language-model deployment, if set to something non-blank
    pub fn llm_deployment_id(&self) -> Option<&str> {
        non_blank(&self.llm_deployment_id)
    }

    /// Custom system prompt, if set to something non-blank
    pub fn system_prompt(&self) -> Option<&str> {
        non_blank(&self.system_prompt)
    }

    /// Base URL of a deployment's OpenAI-compatible API
    pub fn deployment_url(&self, deployment_id: &str) -> String {
        format!(
            "{}/deployments/{}",
            self.endpoint.trim_end_matches('/'),
            deployment_id
        )
    }

    /// Decide the pipeline once, from which deployments are present
    pub fn pipeline_mode(&self) -> Option<PipelineMode> {
        match (self.deployment_id(), self.llm_deployment_id()) {
            (None, _) => None,
            (Some(_), Some(_)) => Some(PipelineMode::Advanced),
            (Some(_), None) => Some(PipelineMode::Simple),
        }
    }

    /// Get the backend call timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            deployment_id: None,
            endpoint: default_endpoint(),
            api_token: String::new(),
            llm_deployment_id: None,
            system_prompt: None,
            model: default_model(),
            timeout_secs: default_backend_timeout(),
            max_retries: default_backend_retries(),
            history_window: default_history_window(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            rag: RagConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
