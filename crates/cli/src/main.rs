//! codesift binary — thin CLI shell over the `codesift-engine` library crate.
//!
//! Mirrors the teacher's clap-derive `Cli`/`Commands` split
//! (`codescope-server/src/main.rs`), trimmed to the two subcommands spec.md
//! §6 calls for plus the `index doctor` subcommand spec.md §9 supplements
//! (wrapping `IndexManager::verify_consistency`/`repair`). Config file
//! loading, the web UI, and the MCP server are all out of scope (spec.md §1).

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use codesift_engine::config::{BatchConfig, VectorStoreConfig, WalkerConfig};
use codesift_engine::embed::{dimension_for_model, DeterministicEmbedder, Embedder, EmbeddingBatcher};
use codesift_engine::index_manager::IndexManager;
use codesift_engine::search::{SearchEngine, SearchOptions};
use codesift_engine::store::{ChunkStore, VectorStore};

#[derive(Parser)]
#[command(name = "codesift", version, about = "Local hybrid (BM25 + ANN) code search", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root directory to index/search.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Directory holding the SQLite chunk store and usearch vector index.
    #[arg(long, global = true, default_value = ".codesift")]
    index_dir: PathBuf,

    /// Embedding model preset (minilm, codebert, starencoder); ignored
    /// unless built with the `semantic` feature.
    #[arg(long, global = true)]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or incrementally update the index for `--root`.
    Index {
        #[command(subcommand)]
        action: Option<IndexAction>,
    },
    /// Run a hybrid search query against the index.
    Search {
        query: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,

        #[arg(long)]
        path_filter: Option<String>,

        #[arg(long, default_value_t = false)]
        multi_hop: bool,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Check chunk-store/vector-store referential integrity without modifying either.
    Doctor {
        #[arg(long, default_value_t = false)]
        repair: bool,
    },
}

fn select_embedder(model: Option<&str>) -> (Arc<dyn Embedder>, usize) {
    #[cfg(feature = "semantic")]
    {
        if let Ok(provider) = codesift_engine::embed::FastEmbedProvider::new(model) {
            let dim = provider.dimension();
            return (Arc::new(provider), dim);
        }
        tracing::warn!("falling back to the deterministic embedder: fastembed model load failed");
    }
    let dim = dimension_for_model(model);
    (Arc::new(DeterministicEmbedder::new(dim)), dim)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    codesift_engine::logging::init_tracing();
    let cli = Cli::parse();

    std::fs::create_dir_all(&cli.index_dir)?;
    let chunk_store = Arc::new(ChunkStore::open(cli.index_dir.join("chunks.sqlite3"))?);
    let (embedder, dim) = select_embedder(cli.model.as_deref());
    let vector_store = Arc::new(VectorStore::open(cli.index_dir.join("vectors.usearch"), VectorStoreConfig::new(dim))?);
    let batcher = EmbeddingBatcher::spawn(embedder, BatchConfig::default());

    match cli.command {
        Commands::Index { action: None } => {
            let manager = IndexManager::new(WalkerConfig::new(&cli.root), chunk_store, Arc::clone(&vector_store), batcher);
            let report = manager.reindex().await?;
            manager.save().ok();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Index { action: Some(IndexAction::Doctor { repair }) } => {
            let manager = IndexManager::new(WalkerConfig::new(&cli.root), chunk_store, Arc::clone(&vector_store), batcher);
            let report = if repair { manager.repair().await? } else { manager.verify_consistency().await? };
            manager.save().ok();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Search { query, limit, path_filter, multi_hop } => {
            let engine = SearchEngine::new(chunk_store, vector_store, batcher);
            let options = SearchOptions { limit, path_filter, multi_hop, ..SearchOptions::default() };
            let results = engine.search(&query, &options).await?;
            for result in results {
                println!("{:>8.4}  {}:{}  {}", result.score, result.chunk.path, result.chunk.start_line, result.chunk.kind.as_str());
            }
        }
    }

    Ok(())
}
