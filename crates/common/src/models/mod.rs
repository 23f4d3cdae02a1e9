//! Core data model
//!
//! Documents produced by the loader and the chunks actually indexed by the
//! vector and lexical indices.

mod chunk;
mod document;

pub use chunk::Chunk;
pub use document::{Document, DocumentMetadata};
