//! Text chunking module
//!
//! Splits oversized documents into overlapping windows, preferring to break
//! on paragraph, line, sentence and word boundaries before falling back to a
//! hard character cut. Sizes are counted in characters.

use august_common::errors::{AppError, Result};
use august_common::{Chunk, Document};
use std::ops::Range;
use tracing::debug;

/// Break points in order of preference
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Configuration for text chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    /// Target chunk size in characters
    chunk_size: usize,
    /// Overlap between adjacent chunks in characters
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(AppError::Validation {
                message: "chunk_size must be positive".to_string(),
            });
        }
        if chunk_overlap >= chunk_size {
            return Err(AppError::Validation {
                message: format!(
                    "chunk_overlap ({}) must be smaller than chunk_size ({})",
                    chunk_overlap, chunk_size
                ),
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split a document; each chunk inherits the full metadata
    pub fn split(&self, document: Document) -> Vec<Chunk> {
        let spans = self.split_spans(&document.content);
        if spans.len() <= 1 {
            return vec![Chunk::from(document)];
        }

        debug!(
            chars = document.char_len(),
            chunks = spans.len(),
            "Document split"
        );

        spans
            .into_iter()
            .map(|span| Chunk::new(&document.content[span], document.metadata.clone()))
            .collect()
    }

    /// Byte ranges of the chunks of `text`, in order.
    ///
    /// Adjacent ranges overlap by at most `chunk_overlap` characters and no
    /// range is longer than `chunk_size` characters. An overlap is moved
    /// forward to the next word start when one exists inside it.
    pub fn split_spans(&self, text: &str) -> Vec<Range<usize>> {
        let chars: Vec<char> = text.chars().collect();
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());

        let total = chars.len();
        if total <= self.chunk_size {
            return vec![0..text.len()];
        }

        let mut spans = Vec::new();
        let mut start = 0;

        loop {
            if total - start <= self.chunk_size {
                spans.push(offsets[start]..offsets[total]);
                break;
            }

            let cut = self.find_cut(&chars, start);
            spans.push(offsets[start]..offsets[cut]);

            let mut next = cut - self.chunk_overlap;
            while next < cut && !chars[next - 1].is_whitespace() {
                next += 1;
            }
            start = next;
        }

        spans
    }

    /// End of the chunk starting at `start`, always past `start + chunk_overlap`
    fn find_cut(&self, chars: &[char], start: usize) -> usize {
        let window_end = start + self.chunk_size;
        let min_cut = (start + self.chunk_overlap + 1).max(start + self.chunk_size / 2);

        for separator in SEPARATORS {
            let separator: Vec<char> = separator.chars().collect();
            for cut in (min_cut..=window_end).rev() {
                if cut >= start + separator.len() && chars[cut - separator.len()..cut] == separator[..] {
                    return cut;
                }
            }
        }

        window_end
    }
}

/// Split a document with the given size and overlap
pub fn split(document: Document, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(chunk_size, chunk_overlap)?.split(document))
}
