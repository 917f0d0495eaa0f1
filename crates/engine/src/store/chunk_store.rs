//! Component D — Chunk Store (structured + full-text).
//!
//! `codescope-server` has no persistence layer at all (everything lives in
//! `ServerState`'s in-memory maps, rebuilt on every restart); the pack's
//! `retrieval` crate (`codex-rs/retrieval/src/storage/sqlite.rs` +
//! `snippets.rs`) is what this module is grounded on instead: the
//! `Arc<Mutex<Connection>>` + `spawn_blocking` wrapper for making a
//! synchronous `rusqlite::Connection` safe to call from async code, the
//! schema-version tracking table, and the FTS5 external-content table kept
//! in sync via `AFTER INSERT/DELETE/UPDATE` triggers. Extended here with the
//! `file_hashes`/`conformances` tables and `unicode61` tokenizer config
//! spec.md §4.D calls for, since the teacher's example only tracks a flat
//! `snippets` table.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};
use tokio::task::spawn_blocking;

use codesift_core::types::{Chunk, ChunkId, ChunkKind, ConformanceEdge, FileRecord};
use codesift_core::CodesiftError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, strftime('%s', 'now'));

CREATE TABLE IF NOT EXISTS file_hashes (
    path TEXT PRIMARY KEY,
    hash TEXT NOT NULL,
    indexed_at_unix INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    path TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    content TEXT NOT NULL,
    kind TEXT NOT NULL,
    symbols TEXT NOT NULL,
    "references" TEXT NOT NULL DEFAULT '',
    doc_comment TEXT,
    signature TEXT,
    breadcrumb TEXT,
    language TEXT NOT NULL,
    token_count INTEGER NOT NULL,
    file_hash TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    fts_text TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_path ON chunks(path);
CREATE INDEX IF NOT EXISTS idx_chunks_kind ON chunks(kind);
CREATE INDEX IF NOT EXISTS idx_chunks_content_hash ON chunks(content_hash);

CREATE TABLE IF NOT EXISTS conformances (
    chunk_id TEXT NOT NULL,
    protocol_name TEXT NOT NULL,
    FOREIGN KEY(chunk_id) REFERENCES chunks(id)
);
CREATE INDEX IF NOT EXISTS idx_conformances_protocol ON conformances(protocol_name);
CREATE INDEX IF NOT EXISTS idx_conformances_chunk ON conformances(chunk_id);

CREATE TABLE IF NOT EXISTS snippets (
    id TEXT PRIMARY KEY,
    path TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    content TEXT NOT NULL,
    breadcrumb TEXT,
    chunk_id TEXT,
    kind TEXT NOT NULL,
    language TEXT NOT NULL,
    token_count INTEGER NOT NULL,
    file_hash TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_snippets_path ON snippets(path);

CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
    body,
    content=chunks,
    content_rowid=rowid,
    tokenize='unicode61 remove_diacritics 2'
);

CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
    INSERT INTO chunks_fts(rowid, body) VALUES (new.rowid, new.fts_text);
END;
CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, body) VALUES ('delete', old.rowid, old.fts_text);
END;
CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, body) VALUES ('delete', old.rowid, old.fts_text);
    INSERT INTO chunks_fts(rowid, body) VALUES (new.rowid, new.fts_text);
END;

CREATE VIRTUAL TABLE IF NOT EXISTS snippets_fts USING fts5(
    body,
    content=snippets,
    content_rowid=rowid,
    tokenize='unicode61 remove_diacritics 2'
);

CREATE TRIGGER IF NOT EXISTS snippets_ai AFTER INSERT ON snippets BEGIN
    INSERT INTO snippets_fts(rowid, body) VALUES (new.rowid, new.content);
END;
CREATE TRIGGER IF NOT EXISTS snippets_ad AFTER DELETE ON snippets BEGIN
    INSERT INTO snippets_fts(snippets_fts, rowid, body) VALUES ('delete', old.rowid, old.content);
END;
CREATE TRIGGER IF NOT EXISTS snippets_au AFTER UPDATE ON snippets BEGIN
    INSERT INTO snippets_fts(snippets_fts, rowid, body) VALUES ('delete', old.rowid, old.content);
    INSERT INTO snippets_fts(rowid, body) VALUES (new.rowid, new.content);
END;
"#;

/// A BM25 hit: `(chunk_id, score)`. Lower bm25 scores are better matches
/// (FTS5 convention); callers wanting "higher is better" should negate.
pub struct FtsHit {
    pub chunk_id: ChunkId,
    pub bm25_score: f64,
}

/// Correlated subquery rehydrating a chunk's `conformances` from the
/// `conformances` link table (spec.md §3.1 `Chunk.conformances`), using
/// `char(31)` (unit separator) between entries so it can't collide with an
/// actual type/protocol name the way a comma could. For use against an
/// unaliased `chunks` table.
const CONFORMANCES_SUBQUERY: &str =
    "(SELECT group_concat(protocol_name, char(31)) FROM conformances WHERE conformances.chunk_id = chunks.id) AS conformances";

/// As [`CONFORMANCES_SUBQUERY`], for queries that alias the `chunks` table as `c`.
const CONFORMANCES_SUBQUERY_C: &str =
    "(SELECT group_concat(protocol_name, char(31)) FROM conformances WHERE conformances.chunk_id = c.id) AS conformances";

/// Async-safe wrapper around a single-writer SQLite connection (spec.md §4.D
/// "single writer, multiple readers").
pub struct ChunkStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl ChunkStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CodesiftError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
        conn.execute_batch(SCHEMA).map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
        Ok(ChunkStore { conn: Arc::new(Mutex::new(conn)), path })
    }

    pub fn open_in_memory() -> Result<Self, CodesiftError> {
        let conn = Connection::open_in_memory().map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
        conn.execute_batch(SCHEMA).map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
        Ok(ChunkStore { conn: Arc::new(Mutex::new(conn)), path: PathBuf::new() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T, CodesiftError>
    where
        F: FnOnce(&Connection) -> Result<T, CodesiftError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f(&guard)
        })
        .await
        .map_err(|e| CodesiftError::Sqlite(format!("worker task panicked: {e}")))?
    }

    /// Replace every chunk, conformance edge, and snippet belonging to
    /// `path` with `chunks`/`conformances`, and upsert its `file_hashes` row
    /// (spec.md §4.F step 5, "delete-then-insert per changed file").
    pub async fn replace_file(
        &self,
        path: &str,
        hash: &str,
        indexed_at_unix: u64,
        chunks: Vec<Chunk>,
    ) -> Result<(), CodesiftError> {
        let path = path.to_string();
        let hash = hash.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM chunks WHERE path = ?1", params![path])
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            conn.execute(
                "DELETE FROM conformances WHERE chunk_id IN (SELECT id FROM chunks WHERE path = ?1)",
                params![path],
            )
            .ok();
            conn.execute("DELETE FROM snippets WHERE path = ?1", params![path])
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;

            for chunk in &chunks {
                conn.execute(
                    "INSERT INTO chunks (id, path, start_line, end_line, content, kind, symbols, \"references\", doc_comment, signature, breadcrumb, language, token_count, file_hash, content_hash, fts_text)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
                    params![
                        chunk.id.to_string(),
                        chunk.path,
                        chunk.start_line as i64,
                        chunk.end_line as i64,
                        chunk.content,
                        chunk.kind.as_str(),
                        chunk.symbols.join(" "),
                        chunk.references.join(" "),
                        chunk.doc_comment,
                        chunk.signature,
                        chunk.breadcrumb,
                        chunk.language,
                        chunk.token_count as i64,
                        chunk.file_hash,
                        chunk.content_hash,
                        chunk.fts_text(),
                    ],
                )
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;

                for protocol in &chunk.conformances {
                    conn.execute(
                        "INSERT INTO conformances (chunk_id, protocol_name) VALUES (?1, ?2)",
                        params![chunk.id.to_string(), protocol],
                    )
                    .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
                }
            }

            conn.execute(
                "INSERT INTO file_hashes (path, hash, indexed_at_unix) VALUES (?1,?2,?3)
                 ON CONFLICT(path) DO UPDATE SET hash = excluded.hash, indexed_at_unix = excluded.indexed_at_unix",
                params![path, hash, indexed_at_unix as i64],
            )
            .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;

            Ok(())
        })
        .await
    }

    /// Remove every row associated with `path` (spec.md §4.F.2 `pruneDeletedFiles`).
    pub async fn remove_file(&self, path: &str) -> Result<(), CodesiftError> {
        let path = path.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM conformances WHERE chunk_id IN (SELECT id FROM chunks WHERE path = ?1)",
                params![path],
            )
            .ok();
            conn.execute("DELETE FROM snippets WHERE path = ?1", params![path])
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            conn.execute("DELETE FROM chunks WHERE path = ?1", params![path])
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            conn.execute("DELETE FROM file_hashes WHERE path = ?1", params![path])
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            Ok(())
        })
        .await
    }

    /// The last indexed hash for `path`, or `None` if it has never been
    /// indexed (spec.md §4.F step 2, incremental reindex's skip check).
    pub async fn file_hash(&self, path: &str) -> Result<Option<String>, CodesiftError> {
        let path = path.to_string();
        self.with_conn(move |conn| {
            conn.query_row("SELECT hash FROM file_hashes WHERE path = ?1", params![path], |r| r.get(0))
                .optional()
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))
        })
        .await
    }

    pub async fn all_file_records(&self) -> Result<Vec<FileRecord>, CodesiftError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT path, hash, indexed_at_unix FROM file_hashes")
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(FileRecord {
                        path: row.get(0)?,
                        hash: row.get(1)?,
                        indexed_at_unix: row.get::<_, i64>(2)? as u64,
                    })
                })
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(|e| CodesiftError::Sqlite(e.to_string()))
        })
        .await
    }

    /// BM25 full-text search over `chunks_fts` (spec.md §4.D "lexical
    /// retrieval"). SQLite FTS5's built-in BM25 uses k1=1.2, b=0.75 and is
    /// not reconfigurable per-query, matching spec.md §4.D's stated defaults.
    pub async fn search_fts(&self, query: &str, limit: usize) -> Result<Vec<FtsHit>, CodesiftError> {
        let query = sanitize_fts_query(query);
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT c.id, bm25(chunks_fts) AS score
                     FROM chunks_fts JOIN chunks c ON c.rowid = chunks_fts.rowid
                     WHERE chunks_fts MATCH ?1
                     ORDER BY score LIMIT ?2",
                )
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            let rows = stmt
                .query_map(params![query, limit as i64], |row| {
                    let id: String = row.get(0)?;
                    let score: f64 = row.get(1)?;
                    Ok((id, score))
                })
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;

            let mut hits = Vec::new();
            for row in rows {
                let (id, score) = row.map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
                if let Ok(chunk_id) = id.parse() {
                    hits.push(FtsHit { chunk_id, bm25_score: score });
                }
            }
            Ok(hits)
        })
        .await
    }

    pub async fn chunk_by_id(&self, id: ChunkId) -> Result<Option<Chunk>, CodesiftError> {
        let id_str = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT id, path, start_line, end_line, content, kind, symbols, \"references\", doc_comment, signature, breadcrumb, language, token_count, file_hash, content_hash, {CONFORMANCES_SUBQUERY}
                     FROM chunks WHERE id = ?1"
                ),
                params![id_str],
                row_to_chunk,
            )
            .optional()
            .map_err(|e| CodesiftError::Sqlite(e.to_string()))
        })
        .await
    }

    /// Every chunk conforming to `protocol_name` (spec.md §4.H "conformance
    /// implementation" boost; also backs multi-hop conformance expansion).
    pub async fn chunks_conforming_to(&self, protocol_name: &str) -> Result<Vec<Chunk>, CodesiftError> {
        let protocol_name = protocol_name.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT c.id, c.path, c.start_line, c.end_line, c.content, c.kind, c.symbols, c.\"references\", c.doc_comment, c.signature, c.breadcrumb, c.language, c.token_count, c.file_hash, c.content_hash, {CONFORMANCES_SUBQUERY_C}
                     FROM chunks c JOIN conformances cf ON cf.chunk_id = c.id
                     WHERE cf.protocol_name = ?1"
                ))
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            let rows = stmt
                .query_map(params![protocol_name], row_to_chunk)
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(|e| CodesiftError::Sqlite(e.to_string()))
        })
        .await
    }

    pub async fn conformances_for(&self, chunk_id: ChunkId) -> Result<Vec<ConformanceEdge>, CodesiftError> {
        let id_str = chunk_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare("SELECT chunk_id, protocol_name FROM conformances WHERE chunk_id = ?1")
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            let rows = stmt
                .query_map(params![id_str], |row| {
                    let id: String = row.get(0)?;
                    let protocol_name: String = row.get(1)?;
                    Ok((id, protocol_name))
                })
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;

            let mut edges = Vec::new();
            for row in rows {
                let (id, protocol_name) = row.map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
                if let Ok(chunk_id) = id.parse() {
                    edges.push(ConformanceEdge { chunk_id, protocol_name });
                }
            }
            Ok(edges)
        })
        .await
    }

    /// Replace every info-snippet row belonging to `path` (spec.md §4.F step
    /// 5 counterpart for snippets, mirrored into `snippets_fts` by trigger).
    /// Called alongside `replace_file`, not folded into it, since a file's
    /// snippets are produced by the same parse pass but aren't chunks.
    pub async fn replace_snippets(&self, path: &str, snippets: Vec<codesift_core::types::InfoSnippet>) -> Result<(), CodesiftError> {
        let path_owned = path.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM snippets WHERE path = ?1", params![path_owned])
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            for snippet in &snippets {
                conn.execute(
                    "INSERT INTO snippets (id, path, start_line, end_line, content, breadcrumb, chunk_id, kind, language, token_count, file_hash)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
                    params![
                        snippet.id.to_string(),
                        snippet.path,
                        snippet.start_line as i64,
                        snippet.end_line as i64,
                        snippet.content,
                        snippet.breadcrumb,
                        snippet.chunk_id.map(|id| id.to_string()),
                        snippet.kind.as_str(),
                        snippet.language,
                        snippet.token_count as i64,
                        snippet.file_hash,
                    ],
                )
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            }
            Ok(())
        })
        .await
    }

    /// BM25 search over the snippet FTS mirror only (spec.md §4.G.4
    /// `searchSnippets` — no semantic component).
    pub async fn search_snippets_fts(&self, query: &str, limit: usize) -> Result<Vec<FtsHit>, CodesiftError> {
        let query = sanitize_fts_query(query);
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT s.id, bm25(snippets_fts) AS score
                     FROM snippets_fts JOIN snippets s ON s.rowid = snippets_fts.rowid
                     WHERE snippets_fts MATCH ?1
                     ORDER BY score LIMIT ?2",
                )
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            let rows = stmt
                .query_map(params![query, limit as i64], |row| {
                    let id: String = row.get(0)?;
                    let score: f64 = row.get(1)?;
                    Ok((id, score))
                })
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;

            let mut hits = Vec::new();
            for row in rows {
                let (id, score) = row.map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
                if let Ok(chunk_id) = id.parse() {
                    hits.push(FtsHit { chunk_id, bm25_score: score });
                }
            }
            Ok(hits)
        })
        .await
    }

    /// First chunk whose `symbols` contains `symbol` verbatim (spec.md
    /// §4.G.3 multi-hop reference expansion: "a known symbol in another
    /// chunk").
    pub async fn chunk_with_symbol(&self, symbol: &str) -> Result<Option<Chunk>, CodesiftError> {
        let needle = format!(" {symbol} ");
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT id, path, start_line, end_line, content, kind, symbols, \"references\", doc_comment, signature, breadcrumb, language, token_count, file_hash, content_hash, {CONFORMANCES_SUBQUERY}
                     FROM chunks WHERE (' ' || symbols || ' ') LIKE ?1 ESCAPE '\\' LIMIT 1"
                ))
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            let like_pattern = format!("%{}%", needle.replace('%', "\\%").replace('_', "\\_"));
            stmt.query_row(params![like_pattern], row_to_chunk).optional().map_err(|e| CodesiftError::Sqlite(e.to_string()))
        })
        .await
    }

    /// Every chunk currently on record for `path` (spec.md §4.F step 4,
    /// "incremental reuse" — the index manager diffs these against a
    /// freshly parsed file by content hash before re-embedding anything).
    pub async fn chunks_for_path(&self, path: &str) -> Result<Vec<Chunk>, CodesiftError> {
        let path = path.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT id, path, start_line, end_line, content, kind, symbols, \"references\", doc_comment, signature, breadcrumb, language, token_count, file_hash, content_hash, {CONFORMANCES_SUBQUERY}
                     FROM chunks WHERE path = ?1"
                ))
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            let rows = stmt
                .query_map(params![path], row_to_chunk)
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(|e| CodesiftError::Sqlite(e.to_string()))
        })
        .await
    }

    /// Drop every chunk, snippet, conformance, and file-hash row (spec.md
    /// §4.F `clear()`). Schema and FTS tables stay in place; they're just
    /// emptied out via the same delete triggers as a normal delete.
    pub async fn clear_all(&self) -> Result<(), CodesiftError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM conformances", []).map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            conn.execute("DELETE FROM snippets", []).map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            conn.execute("DELETE FROM chunks", []).map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            conn.execute("DELETE FROM file_hashes", []).map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            Ok(())
        })
        .await
    }

    pub async fn total_chunks(&self) -> Result<u64, CodesiftError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get::<_, i64>(0))
                .map(|n| n as u64)
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))
        })
        .await
    }

    /// Chunk ids with no matching vector in the vector store's id↔key map
    /// (spec.md §4.F.2 "orphan detection"). Callers pass in the full set of
    /// ids the vector store currently holds.
    pub async fn chunk_ids_missing_from(&self, present: &[ChunkId]) -> Result<Vec<ChunkId>, CodesiftError> {
        let present: std::collections::HashSet<String> = present.iter().map(|id| id.to_string()).collect();
        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare("SELECT id FROM chunks").map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| CodesiftError::Sqlite(e.to_string()))?;

            let mut missing = Vec::new();
            for row in rows {
                let id = row.map_err(|e| CodesiftError::Sqlite(e.to_string()))?;
                if !present.contains(&id) {
                    if let Ok(chunk_id) = id.parse() {
                        missing.push(chunk_id);
                    }
                }
            }
            Ok(missing)
        })
        .await
    }
}

/// Rebuild a [`Chunk`] from a row produced by one of the `SELECT`s above that
/// include `"references"` and the `CONFORMANCES_SUBQUERY*` column, in that
/// order, after the original 14-column projection.
fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<Chunk> {
    let id_str: String = row.get(0)?;
    let kind_str: String = row.get(5)?;
    let symbols_str: String = row.get(6)?;
    let references_str: String = row.get(7)?;
    let conformances_str: Option<String> = row.get(15)?;
    Ok(Chunk {
        id: id_str.parse().unwrap_or_default(),
        path: row.get(1)?,
        start_line: row.get::<_, i64>(2)? as usize,
        end_line: row.get::<_, i64>(3)? as usize,
        content: row.get(4)?,
        kind: ChunkKind::parse(&kind_str).unwrap_or(ChunkKind::Unknown),
        symbols: symbols_str.split(' ').filter(|s| !s.is_empty()).map(|s| s.to_string()).collect(),
        references: references_str.split(' ').filter(|s| !s.is_empty()).map(|s| s.to_string()).collect(),
        doc_comment: row.get(8)?,
        signature: row.get(9)?,
        breadcrumb: row.get(10)?,
        language: row.get(11)?,
        token_count: row.get::<_, i64>(12)? as usize,
        file_hash: row.get(13)?,
        content_hash: row.get(14)?,
        conformances: conformances_str
            .map(|s| s.split('\u{1f}').filter(|s| !s.is_empty()).map(|s| s.to_string()).collect())
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesift_core::types::Chunk as CoreChunk;

    fn sample_chunk(path: &str, content: &str, symbol: &str) -> CoreChunk {
        let mut c = CoreChunk::new(path, 1, 2, content.to_string(), ChunkKind::Function, "rust", "h");
        c.symbols = vec![symbol.to_string()];
        c
    }

    #[tokio::test]
    async fn replace_file_then_search_fts_finds_the_chunk() {
        let store = ChunkStore::open_in_memory().unwrap();
        let chunk = sample_chunk("src/lib.rs", "fn parse_manifest() {}", "parse_manifest");
        store.replace_file("src/lib.rs", "h1", 1, vec![chunk]).await.unwrap();

        let hits = store.search_fts("parse_manifest", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn replace_file_is_idempotent_for_unchanged_reindex() {
        let store = ChunkStore::open_in_memory().unwrap();
        let chunk = sample_chunk("a.rs", "fn foo() {}", "foo");
        store.replace_file("a.rs", "h1", 1, vec![chunk.clone()]).await.unwrap();
        store.replace_file("a.rs", "h1", 2, vec![chunk]).await.unwrap();
        assert_eq!(store.total_chunks().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn remove_file_clears_chunks_and_hash() {
        let store = ChunkStore::open_in_memory().unwrap();
        let chunk = sample_chunk("gone.rs", "fn x() {}", "x");
        store.replace_file("gone.rs", "h1", 1, vec![chunk]).await.unwrap();
        store.remove_file("gone.rs").await.unwrap();
        assert_eq!(store.total_chunks().await.unwrap(), 0);
        assert!(store.file_hash("gone.rs").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn chunks_conforming_to_finds_trait_implementors() {
        let store = ChunkStore::open_in_memory().unwrap();
        let mut chunk = sample_chunk("a.rs", "impl ChunkSource for A {}", "A");
        chunk.conformances = vec!["ChunkSource".to_string()];
        store.replace_file("a.rs", "h1", 1, vec![chunk]).await.unwrap();

        let hits = store.chunks_conforming_to("ChunkSource").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].conformances, vec!["ChunkSource".to_string()]);
    }

    /// `references` and `conformances` must survive a round trip through
    /// every chunk-fetching query, not just the ones that never read them
    /// back — `search/engine.rs` relies on `chunk_by_id` for both the
    /// conformance re-rank boosts and multi-hop reference expansion.
    #[tokio::test]
    async fn chunk_by_id_rehydrates_references_and_conformances() {
        let store = ChunkStore::open_in_memory().unwrap();
        let mut chunk = sample_chunk("a.rs", "struct A;", "A");
        let id = chunk.id;
        chunk.references = vec!["B".to_string(), "C".to_string()];
        chunk.conformances = vec!["Comparable".to_string(), "Codable".to_string()];
        store.replace_file("a.rs", "h1", 1, vec![chunk]).await.unwrap();

        let fetched = store.chunk_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.references, vec!["B".to_string(), "C".to_string()]);
        assert_eq!(fetched.conformances, vec!["Comparable".to_string(), "Codable".to_string()]);

        let by_path = store.chunks_for_path("a.rs").await.unwrap();
        assert_eq!(by_path[0].references, vec!["B".to_string(), "C".to_string()]);
        assert_eq!(by_path[0].conformances, vec!["Comparable".to_string(), "Codable".to_string()]);

        let by_symbol = store.chunk_with_symbol("A").await.unwrap().unwrap();
        assert_eq!(by_symbol.references, vec!["B".to_string(), "C".to_string()]);
        assert_eq!(by_symbol.conformances, vec!["Comparable".to_string(), "Codable".to_string()]);
    }
}
