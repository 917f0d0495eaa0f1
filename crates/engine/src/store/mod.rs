//! Components D and E — the dual-store persistence layer.
//!
//! The [`chunk_store`] (structured + FTS5) and [`vector_store`] (HNSW) are
//! kept consistent by [`crate::index_manager::IndexManager`] via chunk id,
//! not by any shared transaction — spec.md §3.3 names this explicitly as a
//! cross-store invariant the manager must maintain, not something the stores
//! enforce on each other.

pub mod chunk_store;
pub mod vector_store;

pub use chunk_store::{ChunkStore, FtsHit};
pub use vector_store::{VectorHit, VectorStore};
