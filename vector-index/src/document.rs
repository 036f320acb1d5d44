use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use common::error::AppError;

/// A unit of content inserted into an index, decoded from a JSON blob.
///
/// Only `text` is required; `id` falls back to the blob locator when absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Document {
    /// Decode a document blob fetched from the object store.
    ///
    /// Any shape problem surfaces as [`AppError::DocumentRead`] naming the
    /// offending locator, so a batch failure is attributable.
    pub fn from_bytes(locator: &str, bytes: &[u8]) -> Result<Self, AppError> {
        let document: Self = serde_json::from_slice(bytes).map_err(|e| {
            AppError::DocumentRead(format!("malformed document at '{locator}': {e}"))
        })?;
        if document.text.trim().is_empty() {
            return Err(AppError::DocumentRead(format!(
                "document at '{locator}' has no text content"
            )));
        }
        Ok(document)
    }

    /// Identifier used for the nodes derived from this document.
    pub fn effective_id(&self, locator: &str) -> String {
        self.id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| locator.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_document() {
        let doc = Document::from_bytes("lib/a.json", br#"{"text":"hello world"}"#)
            .expect("parse");
        assert_eq!(doc.text, "hello world");
        assert_eq!(doc.effective_id("lib/a.json"), "lib/a.json");
    }

    #[test]
    fn test_parse_document_with_id_and_metadata() {
        let doc = Document::from_bytes(
            "lib/a.json",
            br#"{"id":"doc-1","text":"hello","metadata":{"title":"Intro"}}"#,
        )
        .expect("parse");
        assert_eq!(doc.effective_id("lib/a.json"), "doc-1");
        assert_eq!(
            doc.metadata.get("title").and_then(|v| v.as_str()),
            Some("Intro")
        );
    }

    #[test]
    fn test_malformed_json_is_document_read_error() {
        let err = Document::from_bytes("lib/bad.json", b"{not json")
            .expect_err("must fail");
        assert!(matches!(err, AppError::DocumentRead(_)));
        assert!(err.to_string().contains("lib/bad.json"));
    }

    #[test]
    fn test_missing_text_field_rejected() {
        let err = Document::from_bytes("lib/bad.json", br#"{"id":"x"}"#)
            .expect_err("must fail");
        assert!(matches!(err, AppError::DocumentRead(_)));
    }

    #[test]
    fn test_blank_text_rejected() {
        let err = Document::from_bytes("lib/bad.json", br#"{"text":"   "}"#)
            .expect_err("must fail");
        assert!(matches!(err, AppError::DocumentRead(_)));
    }
}
