//! Corpus loader
//!
//! Turns scraped article records into one [`Document`] per non-empty section.
//! Missing or empty fields are skipped; fields of the wrong type are parse
//! errors.

use august_common::errors::{AppError, Result};
use august_common::{Document, DocumentMetadata};
use serde::Deserialize;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    extraction_status: Option<String>,
    #[serde(default)]
    sections: Option<Vec<RawSection>>,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    #[serde(default)]
    heading: Option<String>,
    #[serde(default)]
    content: Option<SectionContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SectionContent {
    Fragments(Vec<Option<String>>),
    Text(String),
}

impl SectionContent {
    /// Fragments joined by newlines, empty fragments dropped
    fn joined(self) -> String {
        match self {
            SectionContent::Text(text) => text,
            SectionContent::Fragments(fragments) => fragments
                .into_iter()
                .flatten()
                .filter(|f| !f.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Loads structured corpora into documents
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentLoader;

impl DocumentLoader {
    /// Load a corpus: an array of records, or a single record object
    pub fn load(corpus: &Value) -> Result<Vec<Document>> {
        let records: Vec<&Value> = match corpus {
            Value::Array(items) => items.iter().collect(),
            Value::Object(_) => vec![corpus],
            other => {
                return Err(AppError::Parse {
                    message: format!("corpus must be an array of records, found {}", kind(other)),
                })
            }
        };

        let mut documents = Vec::new();
        for (position, value) in records.into_iter().enumerate() {
            let record = RawRecord::deserialize(value).map_err(|e| AppError::Parse {
                message: format!("record {}: {}", position, e),
            })?;
            documents.extend(Self::record_documents(record));
        }

        debug!(documents = documents.len(), "Corpus loaded");
        Ok(documents)
    }

    pub fn load_str(json: &str) -> Result<Vec<Document>> {
        let value: Value = serde_json::from_str(json).map_err(|e| AppError::Parse {
            message: format!("corpus is not valid JSON: {}", e),
        })?;
        Self::load(&value)
    }

    /// Load a corpus file; a missing file is [`AppError::NotFound`]
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Vec<Document>> {
        let path = path.as_ref();
        let json = match tokio::fs::read_to_string(path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::not_found("corpus file", path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let documents = Self::load_str(&json)?;
        info!(path = %path.display(), documents = documents.len(), "Loaded corpus file");
        Ok(documents)
    }

    fn record_documents(record: RawRecord) -> Vec<Document> {
        let Some(sections) = record.sections else {
            return Vec::new();
        };

        let base = DocumentMetadata {
            source: record.source.unwrap_or_else(|| "unknown".to_string()),
            url: record.url.unwrap_or_default(),
            title: record.title.unwrap_or_default(),
            heading: None,
            extraction_status: record
                .extraction_status
                .unwrap_or_else(|| "unknown".to_string()),
        };

        sections
            .into_iter()
            .filter_map(|section| {
                let text = section.content?.joined();
                if text.trim().is_empty() {
                    return None;
                }

                let content = match section.heading.as_deref() {
                    Some(heading) if !heading.is_empty() => {
                        format!("Heading: {}\n\nContent: {}", heading, text)
                    }
                    _ => format!("Content: {}", text),
                };

                Some(Document::new(
                    content,
                    DocumentMetadata {
                        heading: section.heading,
                        ..base.clone()
                    },
                ))
            })
            .collect()
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_sections_become_documents() {
        let corpus = json!([{
            "source": "healthline",
            "url": "https://example.org/bloating",
            "title": "Bloating",
            "extraction_status": "success",
            "sections": [
                {"heading": "Causes", "content": ["Gas builds up.", "Food intolerance."]},
                {"heading": null, "content": "Drink water."}
            ]
        }]);

        let documents = DocumentLoader::load(&corpus).unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(
            documents[0].content,
            "Heading: Causes\n\nContent: Gas builds up.\nFood intolerance."
        );
        assert_eq!(documents[0].metadata.heading.as_deref(), Some("Causes"));
        assert_eq!(documents[0].metadata.source, "healthline");
        assert_eq!(documents[1].content, "Content: Drink water.");
        assert_eq!(documents[1].metadata.heading, None);
        assert_eq!(documents[1].metadata.extraction_status, "success");
    }

    #[test]
    fn test_missing_fields_skipped() {
        let corpus = json!([
            {"title": "no sections"},
            {"sections": [
                {"heading": "No content"},
                {"heading": "Null content", "content": null},
                {"heading": "Blank", "content": ["  ", ""]},
                {"content": "kept"}
            ]}
        ]);

        let documents = DocumentLoader::load(&corpus).unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].metadata.source, "unknown");
        assert_eq!(documents[0].metadata.url, "");
        assert_eq!(documents[0].metadata.extraction_status, "unknown");
    }

    #[test]
    fn test_malformed_types_are_errors() {
        for corpus in [
            json!([{"sections": "not a list"}]),
            json!([{"sections": [42]}]),
            json!([{"sections": [{"content": 7}]}]),
            json!([{"title": ["a"], "sections": []}]),
            json!("just a string"),
            json!([1, 2]),
        ] {
            let err = DocumentLoader::load(&corpus).unwrap_err();
            assert!(matches!(err, AppError::Parse { .. }), "{corpus} -> {err:?}");
        }
    }

    #[test]
    fn test_single_object_corpus() {
        let corpus = json!({"sections": [{"content": ["one"]}]});
        assert_eq!(DocumentLoader::load(&corpus).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_corpus() {
        assert!(DocumentLoader::load(&json!([])).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_json() {
        let err = DocumentLoader::load_str("[{").unwrap_err();
        assert!(matches!(err, AppError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.json");
        std::fs::write(&path, r#"[{"sections": [{"heading": "A", "content": "kefir"}]}]"#).unwrap();

        let documents = DocumentLoader::load_file(&path).await.unwrap();
        assert_eq!(documents.len(), 1);

        let err = DocumentLoader::load_file(dir.path().join("missing.json"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    proptest! {
        /// One document per section with non-blank content, none otherwise
        #[test]
        fn prop_one_document_per_nonempty_section(
            sections in prop::collection::vec(
                (prop::option::of("[A-Za-z]{1,8}"), prop::collection::vec("[ a-z]{0,12}", 0..4)),
                0..12,
            )
        ) {
            let expected = sections
                .iter()
                .filter(|(_, fragments)| fragments.iter().any(|f| !f.trim().is_empty()))
                .count();
            let corpus = json!([{
                "source": "prop",
                "sections": sections
                    .iter()
                    .map(|(heading, content)| json!({"heading": heading, "content": content}))
                    .collect::<Vec<_>>(),
            }]);

            let documents = DocumentLoader::load(&corpus).unwrap();
            prop_assert_eq!(documents.len(), expected);
            for document in &documents {
                prop_assert!(!document.content.trim().is_empty());
            }
        }
    }
}
