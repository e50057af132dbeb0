//! Chat messages and caller-supplied conversation history

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Map a free-form role name; anything unrecognised is a user turn
    pub fn from_loose(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "system" => Role::System,
            "assistant" => Role::Assistant,
            _ => Role::User,
        }
    }
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

/// Decode a JSON-encoded conversation history.
///
/// Malformed JSON and non-array payloads yield an empty history. Array
/// elements that are not objects are skipped; a missing `role` defaults to
/// `user` and a missing `content` to the empty string.
pub fn parse_history(history_json: &str) -> Vec<Message> {
    if history_json.trim().is_empty() {
        return Vec::new();
    }

    let value: Value = match serde_json::from_str(history_json) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse conversation history JSON");
            return Vec::new();
        }
    };

    let Value::Array(items) = value else {
        tracing::warn!("Conversation history is not a JSON array, ignoring it");
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .map(|msg| {
            let role = msg
                .get("role")
                .and_then(Value::as_str)
                .map(Role::from_loose)
                .unwrap_or(Role::User);
            let content = match msg.get("content") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            Message::new(role, content)
        })
        .collect()
}
