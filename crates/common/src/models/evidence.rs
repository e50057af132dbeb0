//! Evidence chunks returned alongside retrieval answers

use serde::Serialize;
use serde_json::{Map, Value};

/// Label used when a chunk carries no source
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// Provenance of a retrieved passage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChunkMetadata {
    /// Document the passage came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Page within the document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

/// One retrieved passage of source text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvidenceChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl EvidenceChunk {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: ChunkMetadata::default(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.metadata.source = non_blank(source.into());
        self
    }

    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.metadata.page = non_blank(page.into());
        self
    }

    /// Source name, or the "Unknown" sentinel
    pub fn source_label(&self) -> &str {
        self.metadata.source.as_deref().unwrap_or(UNKNOWN_SOURCE)
    }

    pub fn page(&self) -> Option<&str> {
        self.metadata.page.as_deref()
    }

    /// Build a chunk from one entry of a backend citations array.
    ///
    /// Returns `None` for entries that are not objects. Metadata that is
    /// missing or not an object is treated as empty.
    pub fn from_value(value: &Value) -> Option<Self> {
        let entry = value.as_object()?;

        let content = entry.get("content").map(scalar_text).unwrap_or_default();
        let metadata = match entry.get("metadata") {
            Some(Value::Object(meta)) => ChunkMetadata::from_map(meta),
            _ => ChunkMetadata::default(),
        };

        Some(Self { content, metadata })
    }

    /// Build the chunk list from a backend citations value; anything but
    /// an array yields no chunks.
    pub fn list_from_value(value: &Value) -> Vec<Self> {
        match value {
            Value::Array(items) => items.iter().filter_map(Self::from_value).collect(),
            _ => Vec::new(),
        }
    }
}

impl ChunkMetadata {
    fn from_map(meta: &Map<String, Value>) -> Self {
        Self {
            source: meta.get("source").map(scalar_text).and_then(non_blank),
            page: meta.get("page").map(scalar_text).and_then(non_blank),
        }
    }
}

/// Render a JSON scalar as text; null becomes empty
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn non_blank(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_full() {
        let value = json!({
            "content": "Relevant passage",
            "metadata": {"source": "manual.pdf", "page": "5"}
        });
        let chunk = EvidenceChunk::from_value(&value).unwrap();
        assert_eq!(chunk.content, "Relevant passage");
        assert_eq!(chunk.source_label(), "manual.pdf");
        assert_eq!(chunk.page(), Some("5"));
    }

    #[test]
    fn test_missing_or_bad_metadata() {
        let chunk = EvidenceChunk::from_value(&json!({"content": "text"})).unwrap();
        assert_eq!(chunk.source_label(), UNKNOWN_SOURCE);
        assert_eq!(chunk.page(), None);

        let chunk =
            EvidenceChunk::from_value(&json!({"content": "text", "metadata": "oops"})).unwrap();
        assert_eq!(chunk.metadata, ChunkMetadata::default());
    }

    #[test]
    fn test_numeric_page_and_blank_fields() {
        let value = json!({"content": "x", "metadata": {"source": "  ", "page": 12}});
        let chunk = EvidenceChunk::from_value(&value).unwrap();
        assert_eq!(chunk.source_label(), UNKNOWN_SOURCE);
        assert_eq!(chunk.page(), Some("12"));
    }

    #[test]
    fn test_list_skips_non_objects() {
        let value = json!([{"content": "a"}, "junk", 3, {"content": "b"}]);
        let chunks = EvidenceChunk::list_from_value(&value);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].content, "b");

        assert!(EvidenceChunk::list_from_value(&json!({"content": "a"})).is_empty());
        assert!(EvidenceChunk::list_from_value(&Value::Null).is_empty());
    }
}
