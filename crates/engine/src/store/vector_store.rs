//! Component E — Vector Store (HNSW approximate nearest neighbor).
//!
//! `codescope-server/src/semantic.rs` does brute-force flat-array cosine
//! similarity over every embedding in memory; it has no ANN index at all.
//! This module is grounded instead on `other_examples/`'s
//! `vyotiq-agent` embedder (`usearch::Index` with `IndexOptions{dimensions,
//! metric: Cos, quantization, connectivity, expansion_add, expansion_search}`,
//! `.add`/`.search`/`.save`/`.load`/`.reserve`/`.capacity`/`.size`), which is
//! the one real example in the retrieved pack that wires up an actual HNSW
//! index — the `.usearch` file extension convention spec.md §6 names even
//! matches that example's `index.usearch` file. usearch keys are `u64`;
//! this store keeps a bidirectional `ChunkId (Uuid) <-> u64` map alongside
//! the index and persists it as a JSON side-file next to the `.usearch` file,
//! since usearch itself only knows about opaque integer keys.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use usearch::ffi::{IndexOptions, MetricKind, ScalarKind};

use codesift_core::types::ChunkId;
use codesift_core::CodesiftError;

use crate::config::VectorStoreConfig;

#[derive(Default, Serialize, Deserialize)]
struct KeyMap {
    next_key: u64,
    id_to_key: HashMap<ChunkId, u64>,
    key_to_id: HashMap<u64, ChunkId>,
}

struct Inner {
    index: usearch::Index,
    keys: KeyMap,
    dim: usize,
}

/// A nearest-neighbor hit: chunk id plus a cosine similarity in `[-1, 1]`
/// (`1 - cosine distance`, spec.md §4.E "similarity score").
pub struct VectorHit {
    pub chunk_id: ChunkId,
    pub similarity: f32,
}

pub struct VectorStore {
    inner: Mutex<Inner>,
    index_path: PathBuf,
    keys_path: PathBuf,
}

impl VectorStore {
    /// Create (or load, if a `.usearch` file already exists at `index_path`)
    /// a vector store of dimension `config.dim`. Loading a persisted index
    /// whose dimension disagrees with `config.dim` is a fatal, non-retryable
    /// error (spec.md §4.E "dimension mismatch on load").
    pub fn open(index_path: impl Into<PathBuf>, config: VectorStoreConfig) -> Result<Self, CodesiftError> {
        let index_path = index_path.into();
        let keys_path = sidecar_path(&index_path);

        let options = IndexOptions {
            dimensions: config.dim,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: config.connectivity,
            expansion_add: 128,
            expansion_search: 64,
            multi: false,
        };
        let index = usearch::Index::new(&options).map_err(|e| CodesiftError::VectorIndex(e.to_string()))?;

        let keys = if index_path.exists() && keys_path.exists() {
            index.load(&index_path.to_string_lossy()).map_err(|e| CodesiftError::LoadFailed(e.to_string()))?;
            let loaded_dim = index.dimensions();
            if loaded_dim != config.dim {
                return Err(CodesiftError::IndexDimensionMismatch {
                    index_dim: loaded_dim,
                    expected_dim: config.dim,
                });
            }
            let raw = std::fs::read_to_string(&keys_path).map_err(|e| CodesiftError::LoadFailed(e.to_string()))?;
            serde_json::from_str(&raw).map_err(|e| CodesiftError::LoadFailed(e.to_string()))?
        } else {
            index
                .reserve(config.initial_capacity)
                .map_err(|e| CodesiftError::VectorIndex(e.to_string()))?;
            KeyMap::default()
        };

        Ok(VectorStore {
            inner: Mutex::new(Inner { index, keys, dim: config.dim }),
            index_path,
            keys_path,
        })
    }

    pub fn open_in_memory(config: VectorStoreConfig) -> Result<Self, CodesiftError> {
        let options = IndexOptions {
            dimensions: config.dim,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: config.connectivity,
            expansion_add: 128,
            expansion_search: 64,
            multi: false,
        };
        let index = usearch::Index::new(&options).map_err(|e| CodesiftError::VectorIndex(e.to_string()))?;
        index.reserve(config.initial_capacity).map_err(|e| CodesiftError::VectorIndex(e.to_string()))?;
        Ok(VectorStore {
            inner: Mutex::new(Inner { index, keys: KeyMap::default(), dim: config.dim }),
            index_path: PathBuf::new(),
            keys_path: PathBuf::new(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.inner.lock().unwrap().dim
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().index.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace `chunk_id`'s vector. Grows capacity geometrically
    /// (doubling) with a bounded number of retries when the index is full,
    /// mirroring the `vyotiq-agent` embedder's `reserve(capacity * 2)`
    /// pattern (spec.md §4.E "capacity growth").
    pub fn upsert(&self, chunk_id: ChunkId, vector: &[f32]) -> Result<(), CodesiftError> {
        let mut inner = self.inner.lock().unwrap();
        if vector.len() != inner.dim {
            return Err(CodesiftError::DimensionMismatch { expected: inner.dim, actual: vector.len() });
        }

        if let Some(&existing_key) = inner.keys.id_to_key.get(&chunk_id) {
            let _ = inner.index.remove(existing_key);
        }

        let key = inner.keys.next_key;
        inner.keys.next_key += 1;

        const MAX_GROWTH_ATTEMPTS: u32 = 8;
        let mut attempt = 0;
        loop {
            match inner.index.add(key, vector) {
                Ok(()) => break,
                Err(e) if attempt < MAX_GROWTH_ATTEMPTS => {
                    attempt += 1;
                    let new_capacity = (inner.index.capacity().max(1) * 2).max(inner.index.size() + 1);
                    inner
                        .index
                        .reserve(new_capacity)
                        .map_err(|_| CodesiftError::CapacityExhausted(new_capacity as u32))?;
                    let _ = e;
                }
                Err(e) => return Err(CodesiftError::VectorIndex(e.to_string())),
            }
        }

        inner.keys.id_to_key.insert(chunk_id, key);
        inner.keys.key_to_id.insert(key, chunk_id);
        Ok(())
    }

    pub fn remove(&self, chunk_id: ChunkId) -> Result<(), CodesiftError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(key) = inner.keys.id_to_key.remove(&chunk_id) {
            inner.keys.key_to_id.remove(&key);
            inner.index.remove(key).map_err(|e| CodesiftError::VectorIndex(e.to_string()))?;
        }
        Ok(())
    }

    pub fn contains(&self, chunk_id: ChunkId) -> bool {
        self.inner.lock().unwrap().keys.id_to_key.contains_key(&chunk_id)
    }

    /// Fetch a single stored vector by id (spec.md §4.E `get`).
    pub fn get(&self, chunk_id: ChunkId) -> Option<Vec<f32>> {
        let inner = self.inner.lock().unwrap();
        let key = *inner.keys.id_to_key.get(&chunk_id)?;
        let mut buffer = vec![0.0f32; inner.dim];
        match inner.index.get(key, &mut buffer) {
            Ok(found) if found > 0 => Some(buffer),
            _ => None,
        }
    }

    /// Batch-fetch stored vectors by id, skipping ids with no vector
    /// (spec.md §4.E `getBatch`; used by the incremental reindex protocol's
    /// step 2 "batch-fetch existing vectors").
    pub fn get_batch(&self, chunk_ids: &[ChunkId]) -> HashMap<ChunkId, Vec<f32>> {
        let inner = self.inner.lock().unwrap();
        let mut out = HashMap::with_capacity(chunk_ids.len());
        for &id in chunk_ids {
            if let Some(&key) = inner.keys.id_to_key.get(&id) {
                let mut buffer = vec![0.0f32; inner.dim];
                if matches!(inner.index.get(key, &mut buffer), Ok(found) if found > 0) {
                    out.insert(id, buffer);
                }
            }
        }
        out
    }

    /// Every chunk id currently carrying a vector (used by the index
    /// manager's consistency check, spec.md §4.F.2).
    pub fn all_ids(&self) -> Vec<ChunkId> {
        self.inner.lock().unwrap().keys.id_to_key.keys().copied().collect()
    }

    pub fn count(&self) -> usize {
        self.len()
    }

    /// Insert or replace a whole batch of vectors, pre-reserving the
    /// capacity they need in one `reserve` call up front rather than
    /// resizing mid-batch (spec.md §4.E "Batch adds pre-allocate required
    /// capacity once before inserting to avoid mid-batch resizes, which
    /// some HNSW implementations cannot safely tolerate").
    pub fn add_batch(&self, items: &[(ChunkId, Vec<f32>)]) -> Result<(), CodesiftError> {
        let mut inner = self.inner.lock().unwrap();
        for (_, vector) in items {
            if vector.len() != inner.dim {
                return Err(CodesiftError::DimensionMismatch { expected: inner.dim, actual: vector.len() });
            }
        }

        let net_new = items.iter().filter(|(id, _)| !inner.keys.id_to_key.contains_key(id)).count();
        let required = inner.index.size() + net_new;
        if required > inner.index.capacity() {
            let new_capacity = (inner.index.capacity().max(1) * 2).max(required);
            inner.index.reserve(new_capacity).map_err(|e| CodesiftError::VectorIndex(e.to_string()))?;
        }

        for (chunk_id, vector) in items {
            if let Some(&existing_key) = inner.keys.id_to_key.get(chunk_id) {
                let _ = inner.index.remove(existing_key);
            }
            let key = inner.keys.next_key;
            inner.keys.next_key += 1;
            inner.index.add(key, vector).map_err(|e| CodesiftError::VectorIndex(e.to_string()))?;
            inner.keys.id_to_key.insert(*chunk_id, key);
            inner.keys.key_to_id.insert(key, *chunk_id);
        }
        Ok(())
    }

    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<VectorHit>, CodesiftError> {
        self.search_with_min_similarity(query, limit, None)
    }

    /// As [`Self::search`], additionally dropping hits below
    /// `min_similarity` (spec.md §4.E `search(vector, limit, minSimilarity)`).
    pub fn search_with_min_similarity(
        &self,
        query: &[f32],
        limit: usize,
        min_similarity: Option<f32>,
    ) -> Result<Vec<VectorHit>, CodesiftError> {
        let inner = self.inner.lock().unwrap();
        if query.len() != inner.dim {
            return Err(CodesiftError::DimensionMismatch { expected: inner.dim, actual: query.len() });
        }
        if inner.index.size() == 0 {
            return Ok(Vec::new());
        }

        let result = inner.index.search(query, limit).map_err(|e| CodesiftError::VectorIndex(e.to_string()))?;
        let mut hits = Vec::with_capacity(result.keys.len());
        for (key, distance) in result.keys.iter().zip(result.distances.iter()) {
            if let Some(&chunk_id) = inner.keys.key_to_id.get(key) {
                let similarity = 1.0 - distance;
                if min_similarity.map_or(true, |min| similarity >= min) {
                    hits.push(VectorHit { chunk_id, similarity });
                }
            }
        }
        Ok(hits)
    }

    /// Drop every vector and reset capacity; deletes the persisted side-file
    /// too (spec.md §4.E "clear semantics").
    pub fn clear(&self) -> Result<(), CodesiftError> {
        let mut inner = self.inner.lock().unwrap();
        let options = IndexOptions {
            dimensions: inner.dim,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: 16,
            expansion_add: 128,
            expansion_search: 64,
            multi: false,
        };
        inner.index = usearch::Index::new(&options).map_err(|e| CodesiftError::VectorIndex(e.to_string()))?;
        inner.index.reserve(1024).map_err(|e| CodesiftError::VectorIndex(e.to_string()))?;
        inner.keys = KeyMap::default();
        if self.keys_path.exists() {
            std::fs::remove_file(&self.keys_path).map_err(|e| CodesiftError::SaveFailed(e.to_string()))?;
        }
        Ok(())
    }

    /// Persist the index and its key map to disk (spec.md §4.E "save").
    pub fn save(&self) -> Result<(), CodesiftError> {
        if self.index_path.as_os_str().is_empty() {
            return Err(CodesiftError::NoPersistencePath);
        }
        let inner = self.inner.lock().unwrap();
        inner
            .index
            .save(&self.index_path.to_string_lossy())
            .map_err(|e| CodesiftError::SaveFailed(e.to_string()))?;
        let json = serde_json::to_string(&inner.keys).map_err(|e| CodesiftError::SaveFailed(e.to_string()))?;
        std::fs::write(&self.keys_path, json).map_err(|e| CodesiftError::SaveFailed(e.to_string()))?;
        Ok(())
    }
}

fn sidecar_path(index_path: &Path) -> PathBuf {
    let mut name = index_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".keys.json");
    index_path.with_file_name(name)
}

/// Shared handle for call sites that need `Arc<VectorStore>`.
pub type SharedVectorStore = Arc<VectorStore>;

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dim: usize) -> VectorStore {
        VectorStore::open_in_memory(VectorStoreConfig::new(dim)).unwrap()
    }

    #[test]
    fn upsert_then_search_finds_itself_as_top_hit() {
        let store = store(4);
        let id = ChunkId::new_v4();
        store.upsert(id, &[1.0, 0.0, 0.0, 0.0]).unwrap();

        let hits = store.search(&[1.0, 0.0, 0.0, 0.0], 5).unwrap();
        assert_eq!(hits[0].chunk_id, id);
        assert!(hits[0].similarity > 0.99);
    }

    #[test]
    fn dimension_mismatch_on_upsert_is_rejected() {
        let store = store(4);
        let err = store.upsert(ChunkId::new_v4(), &[1.0, 0.0]).unwrap_err();
        assert!(matches!(err, CodesiftError::DimensionMismatch { expected: 4, actual: 2 }));
    }

    #[test]
    fn remove_drops_the_vector_from_subsequent_searches() {
        let store = store(3);
        let id = ChunkId::new_v4();
        store.upsert(id, &[0.0, 1.0, 0.0]).unwrap();
        store.remove(id).unwrap();
        assert!(!store.contains(id));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn capacity_grows_past_initial_reservation() {
        let store = VectorStore::open_in_memory(VectorStoreConfig { dim: 3, connectivity: 16, initial_capacity: 2 }).unwrap();
        for _ in 0..10 {
            store.upsert(ChunkId::new_v4(), &[0.1, 0.2, 0.3]).unwrap();
        }
        assert_eq!(store.len(), 10);
    }

    /// spec.md §8 scenario 5: a batch add past initial capacity reserves once
    /// up front rather than resizing per item.
    #[test]
    fn add_batch_past_initial_capacity_reserves_once_and_inserts_everything() {
        let store = VectorStore::open_in_memory(VectorStoreConfig { dim: 3, connectivity: 16, initial_capacity: 4 }).unwrap();
        let ids: Vec<ChunkId> = (0..10).map(|_| ChunkId::new_v4()).collect();
        let items: Vec<(ChunkId, Vec<f32>)> = ids.iter().map(|&id| (id, vec![0.1, 0.2, 0.3])).collect();

        store.add_batch(&items).unwrap();

        assert_eq!(store.count(), 10);
        for id in &ids {
            assert!(store.contains(*id));
        }
        let capacity_after = store.inner.lock().unwrap().index.capacity();
        // A single pre-allocation must already cover every inserted item; a
        // second growth pass would leave capacity strictly short of this
        // only if resizing happened mid-batch, which add_batch never does.
        assert!(capacity_after >= 10);
    }

    #[test]
    fn add_batch_rejects_any_wrong_dimension_vector_without_mutating_state() {
        let store = store(3);
        let id = ChunkId::new_v4();
        store.upsert(id, &[1.0, 0.0, 0.0]).unwrap();

        let err = store
            .add_batch(&[(ChunkId::new_v4(), vec![1.0, 0.0]), (ChunkId::new_v4(), vec![0.0, 1.0, 0.0])])
            .unwrap_err();
        assert!(matches!(err, CodesiftError::DimensionMismatch { expected: 3, actual: 2 }));
        assert_eq!(store.count(), 1, "a rejected batch must not partially insert");
    }
}
