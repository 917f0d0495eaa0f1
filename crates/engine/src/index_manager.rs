//! Component F — Index Manager.
//!
//! Orchestrates the walker, parser, embedding batcher, and the two stores
//! into the incremental reindex protocol (spec.md §4.F.1). Generalizes
//! `codescope-server/src/scan.rs::scan_files` + `build_search_index`'s
//! "walk, then process each file, then assemble the index" shape into an
//! async pipeline: CPU-bound walking/parsing stays on `rayon` via
//! `spawn_blocking`, embedding goes through the batcher, and the two stores
//! are updated last so a crash mid-reindex never leaves chunk rows pointing
//! at vectors that were never written.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use codesift_core::types::{unix_now, Chunk};
use codesift_core::CodesiftError;

use crate::config::WalkerConfig;
use crate::embed::EmbeddingBatcher;
use crate::parser;
use crate::store::{ChunkStore, VectorStore};
use crate::walker;

/// Outcome of a single `reindex` call (spec.md §6 "index" result shape).
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct ReindexReport {
    pub files_scanned: usize,
    pub files_reindexed: usize,
    pub files_skipped_unchanged: usize,
    pub files_removed: usize,
    pub chunks_written: usize,
    pub chunks_embedded: usize,
    pub chunks_reused: usize,
    pub warnings: Vec<String>,
}

/// Outcome of [`IndexManager::verify_consistency`] (spec.md §9, supplemented
/// `index doctor` operation).
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct ConsistencyReport {
    pub orphan_vectors: usize,
    pub missing_vectors: usize,
    pub repaired: bool,
}

/// Point-in-time counts surfaced to callers (spec.md §9 `statistics()`).
#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexStatistics {
    pub total_chunks: u64,
    pub total_vectors: usize,
    pub vector_dimension: usize,
    pub read_only: bool,
}

pub struct IndexManager {
    walker_config: WalkerConfig,
    chunk_store: Arc<ChunkStore>,
    vector_store: Arc<VectorStore>,
    batcher: EmbeddingBatcher,
    read_only: AtomicBool,
}

impl IndexManager {
    pub fn new(
        walker_config: WalkerConfig,
        chunk_store: Arc<ChunkStore>,
        vector_store: Arc<VectorStore>,
        batcher: EmbeddingBatcher,
    ) -> Self {
        IndexManager { walker_config, chunk_store, vector_store, batcher, read_only: AtomicBool::new(false) }
    }

    /// Enter read-only mode (spec.md §4.F.3): reindex/prune/repair become
    /// no-ops returning [`CodesiftError::ReadOnly`]; search is unaffected.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<(), CodesiftError> {
        if self.is_read_only() {
            Err(CodesiftError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Run the incremental reindex protocol end to end:
    /// 1. Walk the configured root for candidate files.
    /// 2. Compute each file's content hash and skip it if unchanged.
    /// 3. Parse changed files into chunks (component B).
    /// 4. Reuse vectors for chunks whose content hash matches a chunk
    ///    already on disk at the same path; only new/changed chunk text is
    ///    sent to the embedder (spec.md §4.F "incremental reuse").
    /// 5. Replace the file's rows in the chunk store.
    /// 6. Upsert fresh and reused vectors into the vector store.
    /// 7. Prune files that disappeared from the walk.
    pub async fn reindex(&self) -> Result<ReindexReport, CodesiftError> {
        self.check_writable()?;

        let mut report = ReindexReport::default();
        let walked = {
            let config = self.walker_config.clone();
            tokio::task::spawn_blocking(move || walker::walk(&config))
                .await
                .map_err(|e| CodesiftError::Io(std::io::Error::other(e.to_string())))?
        };
        report.files_scanned = walked.len();

        let mut seen_paths: HashSet<String> = HashSet::new();

        for file in &walked {
            seen_paths.insert(file.rel_path.clone());

            let bytes = match tokio::fs::read(&file.abs_path).await {
                Ok(b) => b,
                Err(e) => {
                    report.warnings.push(format!("{}: read failed: {e}", file.rel_path));
                    continue;
                }
            };

            let current_hash = codesift_core::hash::sha256_hex(&bytes);
            let previous_hash = self.chunk_store.file_hash(&file.rel_path).await?;
            if previous_hash.as_deref() == Some(current_hash.as_str()) {
                report.files_skipped_unchanged += 1;
                continue;
            }

            let rel_path = file.rel_path.clone();
            let parsed = tokio::task::spawn_blocking(move || parser::parse(&rel_path, &bytes))
                .await
                .map_err(|e| CodesiftError::Io(std::io::Error::other(e.to_string())))?;
            if let Some(warning) = &parsed.warning {
                report.warnings.push(warning.clone());
            }

            self.embed_and_store(&file.rel_path, &current_hash, parsed.chunks, &mut report).await?;
            self.chunk_store.replace_snippets(&file.rel_path, parsed.snippets).await?;
            report.files_reindexed += 1;
        }

        let removed = self.prune_deleted_files(&seen_paths).await?;
        report.files_removed = removed;

        // spec.md §4.C: an explicit flush at end of indexing, so the last
        // partial batch doesn't sit waiting on the idle timeout.
        self.batcher.flush().await;

        Ok(report)
    }

    /// Persist the vector store's HNSW graph and key map to disk (spec.md
    /// §4.F `save()`). The chunk store needs no equivalent call: every write
    /// already lands in `chunks.db` synchronously.
    pub fn save(&self) -> Result<(), CodesiftError> {
        self.vector_store.save()
    }

    /// Drop every chunk, snippet, and vector (spec.md §4.F `clear()`).
    pub async fn clear(&self) -> Result<(), CodesiftError> {
        self.check_writable()?;
        self.chunk_store.clear_all().await?;
        self.vector_store.clear()
    }

    async fn embed_and_store(
        &self,
        path: &str,
        file_hash: &str,
        mut chunks: Vec<Chunk>,
        report: &mut ReindexReport,
    ) -> Result<(), CodesiftError> {
        // Parsing always mints a fresh `ChunkId` (spec.md §3.1), so reuse
        // can't key off chunk id — it keys off `content_hash` against what
        // was on record for this path before this reindex. A match means
        // the text is byte-identical to a chunk we already embedded; carry
        // its old id forward so the existing vector stays valid and no new
        // embedding call is needed (spec.md §4.F step 4 "incremental reuse").
        let previous = self.chunk_store.chunks_for_path(path).await?;
        // Batch-fetch every vector this path currently owns in one call
        // (spec.md §4.F.1 step 2) rather than one lookup per chunk.
        let previous_ids: Vec<_> = previous.iter().map(|c| c.id).collect();
        let old_vectors = self.vector_store.get_batch(&previous_ids);

        let mut by_content_hash: std::collections::HashMap<String, Vec<codesift_core::types::ChunkId>> =
            std::collections::HashMap::new();
        for prev in &previous {
            // Only a content hash with an existing vector on record counts
            // as reusable (spec.md §4.F.1 step 4: "the existing vector is
            // present"); a chunk row whose vector went missing must be
            // re-embedded like anything new.
            if old_vectors.contains_key(&prev.id) {
                by_content_hash.entry(prev.content_hash.clone()).or_default().push(prev.id);
            }
        }

        let mut to_embed_idx = Vec::new();
        let mut to_embed_text = Vec::new();
        let mut reused_vectors: Vec<(codesift_core::types::ChunkId, Vec<f32>)> = Vec::new();

        for (idx, chunk) in chunks.iter_mut().enumerate() {
            if let Some(ids) = by_content_hash.get_mut(&chunk.content_hash) {
                if let Some(reused_id) = ids.pop() {
                    let vector = old_vectors.get(&reused_id).cloned().unwrap_or_default();
                    chunk.id = reused_id;
                    reused_vectors.push((reused_id, vector));
                    continue;
                }
            }
            to_embed_idx.push(idx);
            to_embed_text.push(chunk.fts_text());
        }
        report.chunks_reused += reused_vectors.len();

        // Anything left in `by_content_hash` belonged to content that no
        // longer exists at this path; its vector is now dangling.
        for stale_id in by_content_hash.into_values().flatten() {
            self.vector_store.remove(stale_id)?;
        }

        let mut batch: Vec<(codesift_core::types::ChunkId, Vec<f32>)> = reused_vectors;
        if !to_embed_text.is_empty() {
            let vectors = self.batcher.embed(to_embed_text).await?;
            for (idx, vector) in to_embed_idx.into_iter().zip(vectors) {
                batch.push((chunks[idx].id, vector));
                report.chunks_embedded += 1;
            }
        }
        // Steps 6-7 of spec.md §4.F.1: reused and freshly embedded vectors
        // land together in a single `addBatch` call so capacity is
        // pre-reserved once instead of resized per insert.
        if !batch.is_empty() {
            self.vector_store.add_batch(&batch)?;
        }

        report.chunks_written += chunks.len();
        let indexed_at = unix_now();
        self.chunk_store.replace_file(path, file_hash, indexed_at, std::mem::take(&mut chunks)).await
    }

    /// Remove every indexed file whose path wasn't seen in the most recent
    /// walk (spec.md §4.F.2 `pruneDeletedFiles`).
    pub async fn prune_deleted_files(&self, seen_paths: &HashSet<String>) -> Result<usize, CodesiftError> {
        self.check_writable()?;
        let records = self.chunk_store.all_file_records().await?;
        let mut removed = 0;
        for record in records {
            if !seen_paths.contains(&record.path) {
                self.chunk_store.remove_file(&record.path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Detect vectors with no matching chunk row (orphans) and chunk rows
    /// with no matching vector (missing) — the cross-store referential
    /// integrity invariant spec.md §3.3 names (component D/E consistency).
    pub async fn verify_consistency(&self) -> Result<ConsistencyReport, CodesiftError> {
        let vector_ids = self.vector_store.all_ids();
        let missing = self.chunk_store.chunk_ids_missing_from(&vector_ids).await?;

        let mut orphan_count = 0;
        for chunk_id in &vector_ids {
            if self.chunk_store.chunk_by_id(*chunk_id).await?.is_none() {
                orphan_count += 1;
            }
        }

        Ok(ConsistencyReport { orphan_vectors: orphan_count, missing_vectors: missing.len(), repaired: false })
    }

    /// Repair by dropping orphan vectors (chunk store is source of truth) —
    /// missing vectors can only be fixed by reindexing the owning file, so
    /// `repair` reports them rather than fabricating embeddings for stale
    /// content (spec.md §9 Open Question: repair scope).
    pub async fn repair(&self) -> Result<ConsistencyReport, CodesiftError> {
        self.check_writable()?;
        let vector_ids = self.vector_store.all_ids();
        let missing = self.chunk_store.chunk_ids_missing_from(&vector_ids).await?;

        let mut orphan_count = 0;
        for chunk_id in &vector_ids {
            if self.chunk_store.chunk_by_id(*chunk_id).await?.is_none() {
                self.vector_store.remove(*chunk_id)?;
                orphan_count += 1;
            }
        }

        Ok(ConsistencyReport { orphan_vectors: orphan_count, missing_vectors: missing.len(), repaired: true })
    }

    pub async fn statistics(&self) -> Result<IndexStatistics, CodesiftError> {
        Ok(IndexStatistics {
            total_chunks: self.chunk_store.total_chunks().await?,
            total_vectors: self.vector_store.len(),
            vector_dimension: self.vector_store.dimension(),
            read_only: self.is_read_only(),
        })
    }

    pub fn chunk_store(&self) -> &Arc<ChunkStore> {
        &self.chunk_store
    }

    pub fn vector_store(&self) -> &Arc<VectorStore> {
        &self.vector_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BatchConfig, VectorStoreConfig};
    use crate::embed::DeterministicEmbedder;

    async fn manager(root: &std::path::Path) -> IndexManager {
        let chunk_store = Arc::new(ChunkStore::open_in_memory().unwrap());
        let vector_store = Arc::new(VectorStore::open_in_memory(VectorStoreConfig::new(16)).unwrap());
        let batcher = EmbeddingBatcher::spawn(Arc::new(DeterministicEmbedder::new(16)), BatchConfig::default());
        IndexManager::new(WalkerConfig::new(root), chunk_store, vector_store, batcher)
    }

    #[tokio::test]
    async fn reindex_populates_both_stores_and_second_pass_skips_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.rs"), "fn hello_world() {}\n").unwrap();
        let mgr = manager(tmp.path()).await;

        let first = mgr.reindex().await.unwrap();
        assert_eq!(first.files_reindexed, 1);
        assert!(first.chunks_written >= 1);
        assert_eq!(mgr.chunk_store().total_chunks().await.unwrap(), first.chunks_written as u64);
        assert_eq!(mgr.vector_store().len(), first.chunks_embedded);

        let second = mgr.reindex().await.unwrap();
        assert_eq!(second.files_skipped_unchanged, 1);
        assert_eq!(second.files_reindexed, 0);
    }

    #[tokio::test]
    async fn deleting_a_file_prunes_it_on_next_reindex() {
        let tmp = tempfile::tempdir().unwrap();
        let file_path = tmp.path().join("a.rs");
        std::fs::write(&file_path, "fn hello_world() {}\n").unwrap();
        let mgr = manager(tmp.path()).await;
        mgr.reindex().await.unwrap();

        std::fs::remove_file(&file_path).unwrap();
        let report = mgr.reindex().await.unwrap();
        assert_eq!(report.files_removed, 1);
        assert_eq!(mgr.chunk_store().total_chunks().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn read_only_mode_rejects_reindex() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = manager(tmp.path()).await;
        mgr.set_read_only(true);
        let err = mgr.reindex().await.unwrap_err();
        assert!(matches!(err, CodesiftError::ReadOnly));
    }

    #[tokio::test]
    async fn verify_consistency_reports_zero_for_a_freshly_reindexed_tree() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.rs"), "fn hello_world() {}\n").unwrap();
        let mgr = manager(tmp.path()).await;
        mgr.reindex().await.unwrap();

        let report = mgr.verify_consistency().await.unwrap();
        assert_eq!(report.orphan_vectors, 0);
        assert_eq!(report.missing_vectors, 0);
    }
}
