//! August Ingestion
//!
//! Loads scraped article corpora, splits oversized sections, and writes the
//! same chunk set into the vector and lexical indices of a collection.

pub mod chunker;
pub mod loader;
pub mod pipeline;

pub use chunker::{split, Chunker};
pub use loader::DocumentLoader;
pub use pipeline::{IngestionPipeline, IngestionReport};
