//! Shared data model for codesift: the chunk/snippet vocabulary, the closed
//! [`ChunkKind`] enum, and the error taxonomy every other crate in the
//! workspace returns.
//!
//! Kept deliberately dependency-light (serde, uuid, sha2, thiserror) so both
//! `codesift-engine` and `codesift-cli` — and any future MCP/HTTP layer —
//! agree on one vocabulary without pulling in storage or embedding crates.

pub mod error;
pub mod hash;
pub mod types;

pub use error::CodesiftError;
pub use types::*;

pub type Result<T> = std::result::Result<T, CodesiftError>;
