//! Pluggable token counting.
//!
//! Directly generalizes `codescope-server/src/tokenizer.rs`'s `Tokenizer`
//! trait (`BytesEstimateTokenizer` + feature-gated `TiktokenTokenizer`). The
//! default estimator here uses `len / 4` instead of the teacher's `len / 3`
//! to match spec.md §3.1's stated default (`content.byteLength / 4`); a
//! `Chunk`/`InfoSnippet`'s own `token_count` is still only a fallback —
//! callers that have a real tokenizer available should overwrite it.

use std::sync::Arc;

pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
    fn name(&self) -> &str;
}

/// Default: `len / 4` estimation, no model download, no dependencies.
pub struct ByteEstimateTokenizer;

impl Tokenizer for ByteEstimateTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.len().div_ceil(4)
    }
    fn name(&self) -> &str {
        "byte-estimate"
    }
}

/// Accurate BPE counting via `tiktoken-rs` (requires the `tiktoken` feature).
#[cfg(feature = "tiktoken")]
pub struct TiktokenTokenizer {
    bpe: tiktoken_rs::CoreBPE,
}

#[cfg(feature = "tiktoken")]
impl TiktokenTokenizer {
    pub fn new() -> Result<Self, String> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| e.to_string())?;
        Ok(Self { bpe })
    }
}

#[cfg(feature = "tiktoken")]
impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
    fn name(&self) -> &str {
        "tiktoken"
    }
}

/// Create a tokenizer by name, falling back to [`ByteEstimateTokenizer`] for
/// unknown names (including `"tiktoken"` when the feature isn't compiled in).
pub fn create_tokenizer(name: &str) -> Arc<dyn Tokenizer> {
    #[cfg(feature = "tiktoken")]
    if name == "tiktoken" {
        if let Ok(t) = TiktokenTokenizer::new() {
            return Arc::new(t);
        }
    }
    let _ = name;
    Arc::new(ByteEstimateTokenizer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_estimate_matches_spec_default_formula() {
        let t = ByteEstimateTokenizer;
        assert_eq!(t.count_tokens("abcd"), 1);
        assert_eq!(t.count_tokens("abcde"), 2);
        assert_eq!(t.count_tokens(""), 0);
    }

    #[test]
    fn unknown_name_falls_back_to_byte_estimate() {
        let t = create_tokenizer("bogus");
        assert_eq!(t.name(), "byte-estimate");
    }
}
