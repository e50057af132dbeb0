//! Data models shared by the backends and the pipeline
//!
//! Conversation messages supplied by callers and the evidence chunks
//! returned by the retrieval backend.

mod evidence;
mod message;

pub use evidence::{ChunkMetadata, EvidenceChunk, UNKNOWN_SOURCE};
pub use message::{parse_history, Message, Role};
