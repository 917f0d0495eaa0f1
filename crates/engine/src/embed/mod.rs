//! Component C — embedding providers and the batching queue in front of them.

pub mod batcher;
pub mod provider;

pub use batcher::EmbeddingBatcher;
pub use provider::{dimension_for_model, Embedder};

#[cfg(feature = "semantic")]
pub use provider::FastEmbedProvider;

pub use provider::DeterministicEmbedder;
