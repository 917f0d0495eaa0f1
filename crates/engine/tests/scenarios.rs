//! End-to-end scenarios from spec.md §8's "concrete end-to-end scenarios",
//! exercised through the public `IndexManager`/`SearchEngine` surface rather
//! than any single module's internals.

use std::sync::Arc;

use codesift_core::types::{Chunk, ChunkId, ChunkKind};
use codesift_engine::config::{BatchConfig, VectorStoreConfig, WalkerConfig};
use codesift_engine::embed::{DeterministicEmbedder, EmbeddingBatcher};
use codesift_engine::index_manager::IndexManager;
use codesift_engine::search::{SearchEngine, SearchOptions};
use codesift_engine::store::{ChunkStore, VectorStore};

fn stores(dim: usize) -> (Arc<ChunkStore>, Arc<VectorStore>) {
    let chunk_store = Arc::new(ChunkStore::open_in_memory().unwrap());
    let vector_store = Arc::new(VectorStore::open_in_memory(VectorStoreConfig::new(dim)).unwrap());
    (chunk_store, vector_store)
}

fn batcher(dim: usize) -> EmbeddingBatcher {
    EmbeddingBatcher::spawn(Arc::new(DeterministicEmbedder::new(dim)), BatchConfig::default())
}

/// Scenario 1: exact symbol boost for a rare identifier.
#[tokio::test]
async fn exact_symbol_boost_outranks_substring_match() {
    let (chunk_store, vector_store) = stores(16);

    let exact = Chunk::new(
        "/src/errors.rs",
        1,
        3,
        "pub enum USearchError { CapacityExhausted }".to_string(),
        ChunkKind::Enum,
        "rust",
        "h1",
    );
    let mut exact = exact;
    exact.symbols = vec!["USearchError".to_string()];
    exact.signature = Some("pub enum USearchError".to_string());

    let mut substring = Chunk::new(
        "/src/search.rs",
        1,
        3,
        "pub struct BM25Search { pub errors_seen: usize }".to_string(),
        ChunkKind::Struct,
        "rust",
        "h2",
    );
    substring.symbols = vec!["BM25Search".to_string()];
    substring.signature = Some("pub struct BM25Search".to_string());

    chunk_store.replace_file("/src/errors.rs", "h1", 1, vec![exact]).await.unwrap();
    chunk_store.replace_file("/src/search.rs", "h2", 1, vec![substring]).await.unwrap();

    let engine = SearchEngine::new(chunk_store, vector_store, batcher(16));
    let results = engine.search("USearchError", &SearchOptions::default()).await.unwrap();

    assert!(results.len() >= 2);
    let top_two: Vec<&str> = results.iter().take(2).map(|r| r.chunk.path.as_str()).collect();
    assert!(top_two.contains(&"/src/errors.rs"));

    let exact_score = results.iter().find(|r| r.chunk.path == "/src/errors.rs").unwrap().score;
    let substring_score = results.iter().find(|r| r.chunk.path == "/src/search.rs").map(|r| r.score).unwrap_or(0.0);
    assert!(exact_score > substring_score);
}

/// Scenario 2: "what implements X" ranks the public source implementor
/// above the protocol definition and the test-path mock.
#[tokio::test]
async fn conformance_implementation_query_favors_the_public_source_implementor() {
    let (chunk_store, vector_store) = stores(16);

    let mut protocol = Chunk::new(
        "/Sources/ChunkStore.rs",
        1,
        1,
        "trait ChunkStore { fn replace_file(&self); }".to_string(),
        ChunkKind::Protocol,
        "rust",
        "h1",
    );
    protocol.symbols = vec!["ChunkStore".to_string()];
    protocol.signature = Some("pub trait ChunkStore".to_string());

    let mut mock = Chunk::new(
        "/Tests/MockChunkStore.rs",
        1,
        1,
        "struct MockChunkStore { calls: Vec<String> }".to_string(),
        ChunkKind::Struct,
        "rust",
        "h2",
    );
    mock.symbols = vec!["MockChunkStore".to_string()];
    mock.signature = Some("struct MockChunkStore".to_string());
    mock.conformances = vec!["ChunkStore".to_string()];

    let mut real = Chunk::new(
        "/Sources/GRDBChunkStore.rs",
        1,
        1,
        "pub struct GRDBChunkStore { conn: Connection }".to_string(),
        ChunkKind::Struct,
        "rust",
        "h3",
    );
    real.symbols = vec!["GRDBChunkStore".to_string()];
    real.signature = Some("pub struct GRDBChunkStore".to_string());
    real.conformances = vec!["ChunkStore".to_string(), "InfoSnippetStore".to_string()];

    chunk_store.replace_file("/Sources/ChunkStore.rs", "h1", 1, vec![protocol]).await.unwrap();
    chunk_store.replace_file("/Tests/MockChunkStore.rs", "h2", 1, vec![mock]).await.unwrap();
    chunk_store.replace_file("/Sources/GRDBChunkStore.rs", "h3", 1, vec![real]).await.unwrap();

    let engine = SearchEngine::new(chunk_store, vector_store, batcher(16));
    let results = engine.search("what implements ChunkStore", &SearchOptions::default()).await.unwrap();

    let paths: Vec<&str> = results.iter().map(|r| r.chunk.path.as_str()).collect();
    assert!(paths.len() >= 3, "expected all three conforming/defining chunks to surface, got {paths:?}");
    assert_eq!(paths[0], "/Sources/GRDBChunkStore.rs", "public source implementor must rank first, got {paths:?}");
}

/// Scenario 3: incremental reuse — editing a freestanding comment doesn't
/// change any function's own `content_hash`, so a reindex reuses every
/// vector; editing a function's own body changes exactly that one.
#[tokio::test]
async fn incremental_reuse_tracks_content_hash_not_file_hash() {
    let tmp = tempfile::tempdir().unwrap();
    let file_path = tmp.path().join("lib.rs");

    let source = |comment: &str, body3: &str| {
        let mut lines = Vec::new();
        for i in 0..10 {
            if i == 2 {
                lines.push(format!("// {comment}"));
                lines.push(format!("fn f2() {{ {body3} }}"));
            } else {
                lines.push(format!("fn f{i}() {{ std::hint::black_box({i}); }}"));
            }
        }
        lines.join("\n")
    };

    std::fs::write(&file_path, source("original comment", "std::hint::black_box(2);")).unwrap();

    let chunk_store = Arc::new(ChunkStore::open_in_memory().unwrap());
    let vector_store = Arc::new(VectorStore::open_in_memory(VectorStoreConfig::new(16)).unwrap());
    let manager = IndexManager::new(WalkerConfig::new(tmp.path()), Arc::clone(&chunk_store), Arc::clone(&vector_store), batcher(16));

    let first = manager.reindex().await.unwrap();
    assert_eq!(first.files_reindexed, 1);
    assert_eq!(first.chunks_written, 10);
    assert_eq!(first.chunks_embedded, 10);
    assert_eq!(first.chunks_reused, 0);

    // Edit only the freestanding comment: file bytes change, but every
    // function node's own text is untouched, so every content_hash matches.
    std::fs::write(&file_path, source("updated comment", "std::hint::black_box(2);")).unwrap();
    let second = manager.reindex().await.unwrap();
    assert_eq!(second.chunks_written, 10);
    assert_eq!(second.chunks_reused, 10);
    assert_eq!(second.chunks_embedded, 0, "no embedder call should occur when every chunk's content is unchanged");

    // Now change chunk #3's own body: exactly one chunk needs re-embedding.
    std::fs::write(&file_path, source("updated comment", "std::hint::black_box(999);")).unwrap();
    let third = manager.reindex().await.unwrap();
    assert_eq!(third.chunks_written, 10);
    assert_eq!(third.chunks_reused, 9);
    assert_eq!(third.chunks_embedded, 1);
}

/// Multi-hop expansion (spec.md §4.G.3) follows a result chunk's own
/// `references` to pull in a chunk it names that didn't otherwise match the
/// query — this only works if `references` survives the chunk store's
/// round trip, which `chunk_with_symbol` depends on directly.
#[tokio::test]
async fn multi_hop_expansion_pulls_in_a_referenced_chunk_by_symbol() {
    let (chunk_store, vector_store) = stores(16);

    let mut caller = Chunk::new(
        "/src/main.rs",
        1,
        1,
        "fn main() { parse_manifest(); }".to_string(),
        ChunkKind::Function,
        "rust",
        "h1",
    );
    caller.symbols = vec!["main".to_string()];
    caller.references = vec!["parse_manifest".to_string()];

    let mut callee = Chunk::new(
        "/src/manifest.rs",
        1,
        1,
        "fn parse_manifest() { /* reads Cargo.toml */ }".to_string(),
        ChunkKind::Function,
        "rust",
        "h2",
    );
    callee.symbols = vec!["parse_manifest".to_string()];

    chunk_store.replace_file("/src/main.rs", "h1", 1, vec![caller]).await.unwrap();
    chunk_store.replace_file("/src/manifest.rs", "h2", 1, vec![callee]).await.unwrap();

    let engine = SearchEngine::new(chunk_store, vector_store, batcher(16));
    let options = SearchOptions { multi_hop: true, multi_hop_depth: 1, ..SearchOptions::default() };
    let results = engine.search("main", &options).await.unwrap();

    let hop = results.iter().find(|r| r.chunk.path == "/src/manifest.rs");
    assert!(hop.is_some(), "expected the referenced chunk to be pulled in via multi-hop, got {:?}", results.iter().map(|r| &r.chunk.path).collect::<Vec<_>>());
    assert!(hop.unwrap().is_multi_hop);
}

/// Scenario 5: a single batch add past initial capacity reserves once and
/// inserts every item, rather than resizing per item.
#[test]
fn capacity_growth_during_batch_add_lands_every_vector() {
    let store = VectorStore::open_in_memory(VectorStoreConfig { dim: 3, connectivity: 16, initial_capacity: 4 }).unwrap();
    let ids: Vec<ChunkId> = (0..10).map(|_| ChunkId::new_v4()).collect();
    let items: Vec<(ChunkId, Vec<f32>)> = ids.iter().map(|&id| (id, vec![0.5_f32, 0.5, 0.5])).collect();

    store.add_batch(&items).unwrap();

    assert_eq!(store.count(), 10);
    for id in &ids {
        assert!(store.contains(*id));
    }
}

/// Scenario 6: loading a persisted vector store with a different expected
/// dimension is a fatal, non-retryable error, and the on-disk files survive
/// the failed load attempt untouched.
#[test]
fn dimension_mismatch_on_load_is_fatal_and_preserves_the_files_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let index_path = tmp.path().join("vectors.usearch");

    {
        let store = VectorStore::open(&index_path, VectorStoreConfig::new(384)).unwrap();
        store.upsert(ChunkId::new_v4(), &vec![0.1_f32; 384]).unwrap();
        store.save().unwrap();
    }
    assert!(index_path.exists());

    let err = VectorStore::open(&index_path, VectorStoreConfig::new(768)).unwrap_err();
    assert!(matches!(
        err,
        codesift_core::CodesiftError::IndexDimensionMismatch { index_dim: 384, expected_dim: 768 }
    ));

    // The failed load must not have touched the persisted files.
    assert!(index_path.exists());
    let sidecar = tmp.path().join("vectors.usearch.keys.json");
    assert!(sidecar.exists());
}
