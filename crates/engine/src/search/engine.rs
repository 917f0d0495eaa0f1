//! Component G — Hybrid Search Engine (spec.md §4.G).
//!
//! `codescope-server` keeps BM25-lite (`types.rs::grep_relevance_score`) and
//! semantic search (`semantic.rs::semantic_search`) as two separate,
//! never-fused paths; this module is the fusion the teacher never builds.
//! The fan-out-then-sort *shape* — gather candidates, score, stable sort,
//! truncate to `limit` — still follows `semantic_search`'s own tail
//! (`scores.sort_by(...); scores.truncate(limit)`).

use std::collections::HashMap;
use std::sync::Arc;

use codesift_core::types::{Chunk, ChunkId};
use codesift_core::CodesiftError;

use crate::embed::EmbeddingBatcher;
use crate::search::rerank::{self, RerankWeights, TermFrequencies};
use crate::search::rrf::{self, FusedEntry};
use crate::store::ChunkStore;
use crate::store::VectorStore;
use crate::walker::path_matches_glob;

/// `options` from spec.md §4.G.1.
#[derive(Clone, Debug)]
pub struct SearchOptions {
    pub limit: usize,
    pub semantic_weight: f64,
    pub rrf_k: u32,
    pub alpha: f64,
    pub path_filter: Option<String>,
    pub extension_filter: Option<String>,
    pub multi_hop: bool,
    pub multi_hop_depth: u32,
    pub rerank_weights: RerankWeights,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            limit: 10,
            semantic_weight: 0.5,
            rrf_k: 60,
            alpha: 0.7,
            path_filter: None,
            extension_filter: None,
            multi_hop: false,
            multi_hop_depth: 1,
            rerank_weights: RerankWeights::default(),
        }
    }
}

/// One ranked search result (spec.md §4.G.2 step 7).
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub score: f64,
    pub bm25_score: Option<f64>,
    pub semantic_score: Option<f64>,
    pub bm25_rank: Option<usize>,
    pub semantic_rank: Option<usize>,
    pub is_multi_hop: bool,
    pub hop_depth: u32,
}

pub struct SearchEngine {
    chunk_store: Arc<ChunkStore>,
    vector_store: Arc<VectorStore>,
    batcher: EmbeddingBatcher,
}

impl SearchEngine {
    pub fn new(chunk_store: Arc<ChunkStore>, vector_store: Arc<VectorStore>, batcher: EmbeddingBatcher) -> Self {
        SearchEngine { chunk_store, vector_store, batcher }
    }

    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>, CodesiftError> {
        let fetch = (options.limit * 3).max(options.limit + 10);

        let embedding = self.batcher.embed(vec![query.to_string()]).await?;
        let query_vector = embedding.into_iter().next();

        let bm25_future = self.chunk_store.search_fts(query, fetch);
        let ann_future = async {
            match &query_vector {
                Some(vector) => self.vector_store.search(vector, fetch),
                None => Ok(Vec::new()),
            }
        };
        let (bm25_hits, ann_hits) = tokio::join!(bm25_future, ann_future);
        let bm25_hits = bm25_hits?;
        let ann_hits = ann_hits?;

        // Fetch every distinct chunk once so filtering and boosting don't
        // hit the store repeatedly per list.
        let mut chunks: HashMap<ChunkId, Chunk> = HashMap::new();
        for id in bm25_hits.iter().map(|h| h.chunk_id).chain(ann_hits.iter().map(|h| h.chunk_id)) {
            if !chunks.contains_key(&id) {
                if let Some(chunk) = self.chunk_store.chunk_by_id(id).await? {
                    chunks.insert(id, chunk);
                }
            }
        }

        let passes_filters = |chunk: &Chunk| {
            if let Some(glob) = &options.path_filter {
                if !path_matches_glob(std::path::Path::new(&chunk.path), glob) {
                    return false;
                }
            }
            if let Some(ext) = &options.extension_filter {
                if !chunk.path.ends_with(ext) {
                    return false;
                }
            }
            true
        };

        let bm25_filtered: Vec<(ChunkId, f64)> = bm25_hits
            .iter()
            .filter(|h| chunks.get(&h.chunk_id).is_some_and(passes_filters))
            .map(|h| (h.chunk_id, h.bm25_score))
            .collect();
        let ann_filtered: Vec<(ChunkId, f64)> = ann_hits
            .iter()
            .filter(|h| chunks.get(&h.chunk_id).is_some_and(passes_filters))
            .map(|h| (h.chunk_id, h.similarity as f64))
            .collect();

        let fused = rrf::fuse(&bm25_filtered, &ann_filtered, options.rrf_k, options.semantic_weight);
        let base_scores = self.blend_with_normalized_raw_scores(&fused, options.alpha);

        // Rare-term table approximated from this query's BM25 candidate
        // pool (spec.md §4.H "getTermFrequency"): a full corpus-wide IDF
        // table would need a dedicated term-stats table this spec doesn't
        // otherwise require.
        let mut term_frequencies = TermFrequencies::new();
        for token in query.split_whitespace() {
            let count = chunks.values().filter(|c| c.symbols.iter().any(|s| s == token)).count() as u64;
            term_frequencies.insert(token.to_string(), count);
        }

        let mut results: Vec<SearchResult> = Vec::new();
        for (chunk_id, base) in base_scores {
            let Some(chunk) = chunks.get(&chunk_id) else { continue };
            let entry = &fused[&chunk_id];
            let final_score = rerank::apply_boosts(base, chunk, query, &term_frequencies, options.rerank_weights);
            results.push(SearchResult {
                chunk: chunk.clone(),
                score: final_score,
                bm25_score: entry.bm25_score,
                semantic_score: entry.semantic_score,
                bm25_rank: entry.bm25_rank,
                semantic_rank: entry.semantic_rank,
                is_multi_hop: false,
                hop_depth: 0,
            });
        }

        sort_results(&mut results);

        if options.multi_hop && options.multi_hop_depth >= 1 {
            self.expand_multi_hop(&mut results, query, options, &term_frequencies).await?;
            sort_results(&mut results);
        }

        results.truncate(options.limit);
        Ok(results)
    }

    fn blend_with_normalized_raw_scores(&self, fused: &HashMap<ChunkId, FusedEntry>, alpha: f64) -> Vec<(ChunkId, f64)> {
        let ids: Vec<ChunkId> = fused.keys().copied().collect();
        let raw: Vec<f64> = ids
            .iter()
            .map(|id| {
                let entry = &fused[id];
                entry.semantic_score.or(entry.bm25_score.map(|s| -s)).unwrap_or(0.0)
            })
            .collect();
        let normalized = rrf::min_max_normalize(&raw);

        ids.into_iter()
            .zip(normalized)
            .map(|(id, norm)| {
                let rrf_score = fused[&id].rrf_score;
                (id, alpha * rrf_score + (1.0 - alpha) * norm)
            })
            .collect()
    }

    /// spec.md §4.G.3: for each top result, follow references that resolve
    /// to another chunk's symbol, up to `multiHopDepth` hops, deduplicating
    /// by chunk id (higher-scored occurrence wins).
    async fn expand_multi_hop(
        &self,
        results: &mut Vec<SearchResult>,
        query: &str,
        options: &SearchOptions,
        term_frequencies: &TermFrequencies,
    ) -> Result<(), CodesiftError> {
        let mut seen: HashMap<ChunkId, usize> = results.iter().enumerate().map(|(i, r)| (r.chunk.id, i)).collect();
        let seed: Vec<(ChunkId, Vec<String>, f64)> =
            results.iter().map(|r| (r.chunk.id, r.chunk.references.clone(), r.score)).collect();

        for (_, references, parent_score) in seed {
            for reference in references {
                if results.len() >= options.limit * 4 {
                    break;
                }
                let Some(referenced) = self.chunk_store.chunk_with_symbol(&reference).await? else { continue };
                let hop_score = rerank::apply_boosts(parent_score * 0.5, &referenced, query, term_frequencies, options.rerank_weights);

                match seen.get(&referenced.id) {
                    Some(&idx) if results[idx].score >= hop_score => continue,
                    Some(&idx) => {
                        results[idx].score = hop_score;
                        results[idx].is_multi_hop = true;
                        results[idx].hop_depth = 1;
                    }
                    None => {
                        seen.insert(referenced.id, results.len());
                        results.push(SearchResult {
                            chunk: referenced,
                            score: hop_score,
                            bm25_score: None,
                            semantic_score: None,
                            bm25_rank: None,
                            semantic_rank: None,
                            is_multi_hop: true,
                            hop_depth: 1,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// spec.md §4.G.4: BM25-only search over the snippet FTS mirror.
    pub async fn search_snippets(&self, query: &str, limit: usize) -> Result<Vec<(ChunkId, f64)>, CodesiftError> {
        let hits = self.chunk_store.search_snippets_fts(query, limit).await?;
        Ok(hits.into_iter().map(|h| (h.chunk_id, h.bm25_score)).collect())
    }
}

/// Stable sort by final score descending, ties broken by higher similarity,
/// then shorter path, then earlier start line (spec.md §4.G.2 step 7).
fn sort_results(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let a_sem = a.semantic_score.unwrap_or(f64::NEG_INFINITY);
                let b_sem = b.semantic_score.unwrap_or(f64::NEG_INFINITY);
                b_sem.partial_cmp(&a_sem).unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.chunk.path.len().cmp(&b.chunk.path.len()))
            .then_with(|| a.chunk.start_line.cmp(&b.chunk.start_line))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BatchConfig, VectorStoreConfig};
    use crate::embed::DeterministicEmbedder;
    use codesift_core::types::{Chunk as CoreChunk, ChunkKind};

    fn engine_with(chunk_store: Arc<ChunkStore>, dim: usize) -> SearchEngine {
        let vector_store = Arc::new(VectorStore::open_in_memory(VectorStoreConfig::new(dim)).unwrap());
        let batcher = EmbeddingBatcher::spawn(Arc::new(DeterministicEmbedder::new(dim)), BatchConfig::default());
        SearchEngine::new(chunk_store, vector_store, batcher)
    }

    #[tokio::test]
    async fn search_returns_lexical_hit_with_populated_bm25_fields() {
        let chunk_store = Arc::new(ChunkStore::open_in_memory().unwrap());
        let chunk = CoreChunk::new("/src/lib.rs", 1, 5, "fn parse_manifest() {}".to_string(), ChunkKind::Function, "rust", "h1");
        chunk_store.replace_file("/src/lib.rs", "h1", 1, vec![chunk]).await.unwrap();

        let engine = engine_with(chunk_store, 16);
        let results = engine.search("parse_manifest", &SearchOptions::default()).await.unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].bm25_score.is_some());
        assert!(results[0].bm25_rank.is_some());
    }

    #[tokio::test]
    async fn path_filter_excludes_non_matching_chunks() {
        let chunk_store = Arc::new(ChunkStore::open_in_memory().unwrap());
        let a = CoreChunk::new("/src/a.rs", 1, 2, "fn widget() {}".to_string(), ChunkKind::Function, "rust", "h1");
        let b = CoreChunk::new("/tests/b.rs", 1, 2, "fn widget() {}".to_string(), ChunkKind::Function, "rust", "h2");
        chunk_store.replace_file("/src/a.rs", "h1", 1, vec![a]).await.unwrap();
        chunk_store.replace_file("/tests/b.rs", "h2", 1, vec![b]).await.unwrap();

        let engine = engine_with(chunk_store, 16);
        let mut options = SearchOptions::default();
        options.path_filter = Some("/src/**".to_string());
        let results = engine.search("widget", &options).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.path, "/src/a.rs");
    }
}
