//! Error taxonomy.
//!
//! Mirrors the provider/storage/parse/manager split of the design doc rather
//! than collapsing everything into a single opaque string, so callers can
//! match on the variant that matters to them (a dimension mismatch at load
//! time needs a different recovery path than a transient provider timeout).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodesiftError {
    // -- Provider errors (spec.md §7, "Provider errors") ------------------
    #[error("embedding provider unavailable")]
    ProviderNotAvailable,

    #[error("embedding model not found: {0}")]
    ModelNotFound(String),

    #[error("failed to download embedding model: {0}")]
    DownloadFailed(String),

    #[error("embedding provider API error {code}: {message}")]
    ProviderApiError { code: String, message: String },

    #[error("network error contacting embedding provider: {0}")]
    NetworkError(String),

    #[error("invalid input for embedding provider: {0}")]
    InvalidInput(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding provider timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("all embedding providers failed: {0:?}")]
    AllProvidersFailed(std::collections::BTreeMap<String, String>),

    // -- Storage errors (spec.md §7, "Storage errors") ---------------------
    #[error(
        "vector index dimension mismatch: index was built with dim={index_dim}, caller expects dim={expected_dim}; delete the index and re-index"
    )]
    IndexDimensionMismatch { index_dim: usize, expected_dim: usize },

    #[error("no index found at {0}")]
    IndexNotFound(std::path::PathBuf),

    #[error("store has no persistence path configured")]
    NoPersistencePath,

    #[error("failed to save index: {0}")]
    SaveFailed(String),

    #[error("failed to load index: {0}")]
    LoadFailed(String),

    #[error("vector store capacity exhausted after {0} retries")]
    CapacityExhausted(u32),

    #[error("schema migration failed: {0}")]
    SchemaMigrationFailed(String),

    #[error("unrecognized chunk kind string: {0}")]
    InvalidKind(String),

    #[error("sqlite error: {0}")]
    Sqlite(String),

    #[error("vector index error: {0}")]
    VectorIndex(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("(de)serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    // -- Manager errors (spec.md §7, "Manager errors") ----------------------
    #[error("index manager is read-only")]
    ReadOnly,

    #[error("operation cancelled")]
    Cancelled,
}

impl CodesiftError {
    /// True for errors that leave prior state intact (spec.md §7 propagation
    /// policy: storage errors during `indexFile` must not update the file
    /// record). Used by the index manager to decide whether a failed file
    /// is safe to retry on the next run without special-casing.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CodesiftError::ReadOnly | CodesiftError::InvalidKind(_))
    }
}
