//! Embedding providers.
//!
//! The teacher (`codescope-server/src/semantic.rs`) loads a `candle`-based
//! BERT model directly; its declared `Cargo.toml` stack instead commits to
//! `fastembed`/`ort`, which is what this module actually wraps — grounded on
//! `semantic.rs`'s `resolve_model`/`ModelConfig` (preset name → dimension)
//! and its CUDA/CPU device-selection fallback, both kept in spirit.

use codesift_core::CodesiftError;

/// A provider of dense vector embeddings for text. Synchronous and
/// `Send + Sync` so [`crate::embed::batcher::EmbeddingBatcher`] can run calls
/// inside `tokio::task::spawn_blocking`.
pub trait Embedder: Send + Sync {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CodesiftError>;
    fn dimension(&self) -> usize;
    fn name(&self) -> &str;
}

/// Resolve a model preset name to its embedding dimension, mirroring
/// `semantic::resolve_model`'s preset table.
pub fn dimension_for_model(name: Option<&str>) -> usize {
    match name {
        None | Some("minilm") => 384,
        Some("codebert") | Some("starencoder") => 768,
        Some(_) => 768,
    }
}

#[cfg(feature = "semantic")]
pub struct FastEmbedProvider {
    model: std::sync::Mutex<fastembed::TextEmbedding>,
    dim: usize,
    name: String,
}

#[cfg(feature = "semantic")]
impl FastEmbedProvider {
    /// Load (downloading on first use, same as `semantic::load_model`) the
    /// model named by `preset`, defaulting to MiniLM-L6-v2 (spec.md §4.C
    /// "default provider").
    pub fn new(preset: Option<&str>) -> Result<Self, CodesiftError> {
        let model_kind = match preset {
            None | Some("minilm") => fastembed::EmbeddingModel::AllMiniLML6V2Q,
            Some("codebert") | Some("starencoder") => fastembed::EmbeddingModel::BGEBaseENV15,
            Some(_) => fastembed::EmbeddingModel::BGEBaseENV15,
        };

        let options = fastembed::InitOptions::new(model_kind.clone()).with_show_download_progress(false);
        let model = fastembed::TextEmbedding::try_new(options)
            .map_err(|e| CodesiftError::DownloadFailed(e.to_string()))?;

        Ok(FastEmbedProvider {
            model: std::sync::Mutex::new(model),
            dim: dimension_for_model(preset),
            name: preset.unwrap_or("minilm").to_string(),
        })
    }
}

#[cfg(feature = "semantic")]
impl Embedder for FastEmbedProvider {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CodesiftError> {
        let mut model = self.model.lock().map_err(|_| CodesiftError::ProviderApiError {
            code: "lock_poisoned".to_string(),
            message: "embedding model mutex poisoned by a prior panic".to_string(),
        })?;
        model.embed(texts.to_vec(), None).map_err(|e| CodesiftError::ProviderApiError {
            code: "fastembed_error".to_string(),
            message: e.to_string(),
        })
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Deterministic embedder with no model download, used in tests and as the
/// engine's provider of last resort when `semantic` is compiled out. Hashes
/// each text into a fixed-dimension unit vector, so identical input always
/// produces identical output (component C's reuse invariant, spec.md §4.F
/// step 4, depends on embeddings being reproducible for unchanged content).
pub struct DeterministicEmbedder {
    dim: usize,
}

impl DeterministicEmbedder {
    pub fn new(dim: usize) -> Self {
        DeterministicEmbedder { dim }
    }
}

impl Embedder for DeterministicEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CodesiftError> {
        Ok(texts.iter().map(|t| hash_to_vector(t, self.dim)).collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "deterministic-hash"
    }
}

fn hash_to_vector(text: &str, dim: usize) -> Vec<f32> {
    let digest = codesift_core::hash::sha256_hex(text.as_bytes());
    let bytes = digest.as_bytes();
    let mut vector: Vec<f32> = (0..dim)
        .map(|i| {
            let b = bytes[i % bytes.len()];
            (b as f32 / 255.0) * 2.0 - 1.0
        })
        .collect();
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_embedder_is_stable_and_unit_length() {
        let embedder = DeterministicEmbedder::new(16);
        let a = embedder.embed_batch(&["fn foo() {}".to_string()]).unwrap();
        let b = embedder.embed_batch(&["fn foo() {}".to_string()]).unwrap();
        assert_eq!(a, b);
        let norm: f32 = a[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn different_text_yields_different_vectors() {
        let embedder = DeterministicEmbedder::new(16);
        let a = embedder.embed_batch(&["alpha".to_string()]).unwrap();
        let b = embedder.embed_batch(&["beta".to_string()]).unwrap();
        assert_ne!(a, b);
    }
}
