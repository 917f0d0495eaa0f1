//! codesift-engine — the indexing pipeline, dual-store index, and hybrid
//! search engine described in the top-level design doc.
//!
//! Module layout mirrors the component table: [`walker`] (A), [`parser`]
//! (B), [`embed`] (C), [`store::chunk_store`] (D), [`store::vector_store`]
//! (E), [`index_manager`] (F), [`search::engine`] (G), [`search::rerank`] (H).

pub mod config;
pub mod embed;
pub mod index_manager;
pub mod logging;
pub mod parser;
pub mod search;
pub mod store;
pub mod tokenizer;
pub mod walker;

pub use codesift_core::{
    Chunk, ChunkId, ChunkKind, CodesiftError, ConformanceEdge, FileRecord, InfoSnippet,
    SnippetKind, VectorEntry,
};

pub type Result<T> = std::result::Result<T, CodesiftError>;
