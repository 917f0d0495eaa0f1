//! Reciprocal Rank Fusion (spec.md §4.G.2 step 4).
//!
//! `codescope-server` never fuses its BM25-lite (`types.rs::grep_relevance_score`)
//! and semantic (`semantic.rs::semantic_search`) paths — callers pick one or
//! the other. RRF is new relative to the teacher; it's grounded on the
//! arithmetic spec.md §8 scenario 4 specifies rather than on any example file.

use std::collections::HashMap;

use codesift_core::types::ChunkId;

/// One retriever's ranked output: `(chunk_id, raw_score)` in best-first order.
pub type RankedList = Vec<(ChunkId, f64)>;

/// Per-chunk fusion bookkeeping the re-ranker and result assembly need.
#[derive(Debug, Clone, Default)]
pub struct FusedEntry {
    pub rrf_score: f64,
    pub bm25_score: Option<f64>,
    pub semantic_score: Option<f64>,
    pub bm25_rank: Option<usize>,
    pub semantic_rank: Option<usize>,
}

/// Fuse a BM25 list (lower raw score is better, FTS5 bm25 convention) and a
/// semantic list (higher raw score is better, cosine similarity) into one
/// map keyed by chunk id. Ranks are 1-based position in each input list.
///
/// `rrf(c) = (1 - w)/(k + rB) + w/(k + rS)`, using `rB = rS = ∞` (i.e. that
/// term drops to 0) when `c` is absent from a list (spec.md §4.G.2 step 4).
pub fn fuse(bm25: &[(ChunkId, f64)], semantic: &[(ChunkId, f64)], k: u32, semantic_weight: f64) -> HashMap<ChunkId, FusedEntry> {
    let mut entries: HashMap<ChunkId, FusedEntry> = HashMap::new();
    let k = k as f64;
    let lexical_weight = 1.0 - semantic_weight;

    for (rank, (chunk_id, score)) in bm25.iter().enumerate() {
        let rank = rank + 1;
        let entry = entries.entry(*chunk_id).or_default();
        entry.bm25_score = Some(*score);
        entry.bm25_rank = Some(rank);
        entry.rrf_score += lexical_weight / (k + rank as f64);
    }

    for (rank, (chunk_id, score)) in semantic.iter().enumerate() {
        let rank = rank + 1;
        let entry = entries.entry(*chunk_id).or_default();
        entry.semantic_score = Some(*score);
        entry.semantic_rank = Some(rank);
        entry.rrf_score += semantic_weight / (k + rank as f64);
    }

    entries
}

/// Min-max normalize a score column to `[0, 1]`; a constant column normalizes
/// to `1.0` everywhere rather than dividing by zero (spec.md §4.G.2 step 5
/// "normalized(c)").
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;
    values
        .iter()
        .map(|&v| if spread <= f64::EPSILON { 1.0 } else { (v - min) / spread })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn disjoint_lists_fuse_per_the_worked_example() {
        let a = ChunkId::from(Uuid::from_u128(1));
        let b = ChunkId::from(Uuid::from_u128(2));
        let c = ChunkId::from(Uuid::from_u128(3));
        let d = ChunkId::from(Uuid::from_u128(4));
        let e = ChunkId::from(Uuid::from_u128(5));

        let bm25 = vec![(a, 1.0), (b, 2.0), (c, 3.0)];
        let semantic = vec![(c, 0.9), (d, 0.8), (e, 0.7)];

        let fused = fuse(&bm25, &semantic, 60, 0.5);

        assert!((fused[&a].rrf_score - 0.5 / 61.0).abs() < 1e-9);
        assert!((fused[&b].rrf_score - 0.5 / 62.0).abs() < 1e-9);
        let c_expected = 0.5 / 63.0 + 0.5 / 61.0;
        assert!((fused[&c].rrf_score - c_expected).abs() < 1e-9);
        assert!((fused[&e].rrf_score - 0.5 / 63.0).abs() < 1e-9);

        let mut ranked: Vec<_> = fused.iter().collect();
        ranked.sort_by(|x, y| y.1.rrf_score.partial_cmp(&x.1.rrf_score).unwrap());
        assert_eq!(*ranked[0].0, c);
        assert_eq!(*ranked[ranked.len() - 1].0, e);
    }

    #[test]
    fn constant_column_normalizes_to_one_everywhere() {
        let normalized = min_max_normalize(&[5.0, 5.0, 5.0]);
        assert_eq!(normalized, vec![1.0, 1.0, 1.0]);
    }
}
