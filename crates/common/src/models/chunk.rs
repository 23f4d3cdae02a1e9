//! Indexed chunk with content-derived identity

use super::{Document, DocumentMetadata};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Field separator used when hashing chunk identity
const IDENTITY_SEPARATOR: u8 = 0x1f;

/// A document or a sub-segment of one; the unit stored in both indices
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: DocumentMetadata,
}

impl Chunk {
    pub fn new(text: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Stable identity over text and metadata.
    ///
    /// Two chunks with the same text and metadata are the same chunk no matter
    /// which index returned them; fusion deduplicates on this value.
    pub fn identity(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text.as_bytes());
        for field in [
            Some(self.metadata.source.as_str()),
            Some(self.metadata.url.as_str()),
            Some(self.metadata.title.as_str()),
            self.metadata.heading.as_deref(),
            Some(self.metadata.extraction_status.as_str()),
        ] {
            hasher.update([IDENTITY_SEPARATOR]);
            match field {
                Some(value) => {
                    hasher.update([1u8]);
                    hasher.update(value.as_bytes());
                }
                None => hasher.update([0u8]),
            }
        }
        hex::encode(hasher.finalize())
    }
}

impl From<Document> for Chunk {
    fn from(document: Document) -> Self {
        Self {
            text: document.content,
            metadata: document.metadata,
        }
    }
}
