//! Ingested document and its metadata

use serde::{Deserialize, Deserializer, Serialize};

const UNKNOWN: &str = "unknown";

/// Metadata carried by every document and inherited unchanged by its chunks.
///
/// A `null` value deserializes like a missing field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentMetadata {
    /// Publisher or site the article came from
    #[serde(deserialize_with = "unknown_if_null")]
    pub source: String,

    /// Article URL
    #[serde(deserialize_with = "empty_if_null")]
    pub url: String,

    /// Article title
    #[serde(deserialize_with = "empty_if_null")]
    pub title: String,

    /// Section heading, absent for untitled sections
    pub heading: Option<String>,

    /// Status reported by the scraper that produced the record
    #[serde(deserialize_with = "unknown_if_null")]
    pub extraction_status: String,
}

fn unknown_if_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(|| UNKNOWN.to_string()))
}

fn empty_if_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            source: UNKNOWN.to_string(),
            url: String::new(),
            title: String::new(),
            heading: None,
            extraction_status: UNKNOWN.to_string(),
        }
    }
}

/// A unit of ingested knowledge: one article section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Formatted body, including the `Heading:` / `Content:` prefix
    pub content: String,

    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// Length of the content in characters (not bytes)
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}
