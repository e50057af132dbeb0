//! RagForge Common Library
//!
//! Shared code for the RagForge services including:
//! - Configuration management
//! - Error types and handling
//! - Chat-completion backend clients
//! - Conversation and evidence models
//! - The retrieval-augmented answering pipeline
//! - Metrics and observability

pub mod backend;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod rag;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use rag::RagService;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
