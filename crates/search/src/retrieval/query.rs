//! Query input adapter
//!
//! Callers hand over either a plain string or a chat message object carrying
//! the text in `content`. Both are normalized here, once, at the boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A query as received from the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryInput {
    Text(String),
    Message { content: String },
}

impl QueryInput {
    /// Search text with surrounding whitespace removed
    pub fn text(&self) -> &str {
        match self {
            QueryInput::Text(text) => text.trim(),
            QueryInput::Message { content } => content.trim(),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            QueryInput::Text(text) | QueryInput::Message { content: text } => text.trim().to_string(),
        }
    }

    /// Normalize an arbitrary JSON value.
    ///
    /// Strings are used as is, objects contribute their `content` field, and
    /// anything else is rendered as JSON text.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(text) => QueryInput::Text(text),
            Value::Object(mut map) => match map.remove("content") {
                Some(Value::String(content)) => QueryInput::Message { content },
                Some(other) => QueryInput::Text(other.to_string()),
                None => QueryInput::Text(Value::Object(map).to_string()),
            },
            other => QueryInput::Text(other.to_string()),
        }
    }
}

impl From<&str> for QueryInput {
    fn from(text: &str) -> Self {
        QueryInput::Text(text.to_string())
    }
}

impl From<String> for QueryInput {
    fn from(text: String) -> Self {
        QueryInput::Text(text)
    }
}

impl From<&String> for QueryInput {
    fn from(text: &String) -> Self {
        QueryInput::Text(text.clone())
    }
}

impl From<Value> for QueryInput {
    fn from(value: Value) -> Self {
        QueryInput::from_json(value)
    }
}
