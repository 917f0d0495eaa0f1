//! Runtime configuration for the indexing pipeline.
//!
//! Generalizes `codescope-server/src/types.rs`'s `ScanConfig` (root +
//! skip-dirs + extension allow-list) to the glob include/exclude surface
//! spec.md §4.A requires, and adds the batching/search-default knobs the
//! spec calls out by name (batch size, RRF k, α blend). Loading this from a
//! config *file* is out of scope (spec.md §1) — this struct is the in-memory
//! shape a config loader would populate.

use std::collections::HashSet;
use std::path::PathBuf;

/// Configuration for the file walker (component A).
#[derive(Clone, Debug)]
pub struct WalkerConfig {
    pub root: PathBuf,
    /// Glob patterns that a path must match at least one of (empty = match all).
    pub include: Vec<String>,
    /// Glob patterns that exclude a path even if it matched `include`.
    pub exclude: Vec<String>,
    /// Extension allow-list (without the leading dot); empty = all extensions.
    pub extensions: HashSet<String>,
    /// Directory names never descended into.
    pub skip_dirs: HashSet<String>,
    /// Files larger than this are skipped with a warning (spec.md §4.A).
    pub max_file_size: u64,
    /// Follow symbolic links during the walk (default: false per spec.md §4.A).
    pub follow_symlinks: bool,
}

impl WalkerConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        WalkerConfig {
            root: root.into(),
            include: Vec::new(),
            exclude: Vec::new(),
            extensions: HashSet::new(),
            skip_dirs: [".git", "node_modules", "__pycache__", "target", "dist", "build", "vendor"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size: 2 * 1024 * 1024,
            follow_symlinks: false,
        }
    }
}

/// Batching knobs for the embedding batcher (component C, spec.md §4.C).
#[derive(Clone, Copy, Debug)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub batch_timeout_ms: u64,
    pub batch_memory_limit_bytes: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig { batch_size: 32, batch_timeout_ms: 150, batch_memory_limit_bytes: 10 * 1024 * 1024 }
    }
}

/// Defaults for [`crate::search::SearchOptions`] (spec.md §4.G/§6).
#[derive(Clone, Copy, Debug)]
pub struct SearchDefaults {
    pub limit: usize,
    pub semantic_weight: f32,
    pub rrf_k: u32,
    pub alpha: f32,
    pub multi_hop_depth: u32,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        SearchDefaults { limit: 10, semantic_weight: 0.5, rrf_k: 60, alpha: 0.7, multi_hop_depth: 1 }
    }
}

/// Parameters for the vector store's HNSW index (component E, spec.md §4.E).
#[derive(Clone, Copy, Debug)]
pub struct VectorStoreConfig {
    pub dim: usize,
    pub connectivity: usize,
    pub initial_capacity: usize,
}

impl VectorStoreConfig {
    pub fn new(dim: usize) -> Self {
        VectorStoreConfig { dim, connectivity: 16, initial_capacity: 1024 }
    }
}
