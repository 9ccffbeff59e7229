//! SQLite-based vector index implementation.
//!
//! Embeddings are stored as little-endian f32 blobs and nearest neighbours are
//! found by a full scan with cosine distance computed in Rust. A screenplay
//! corpus is a few thousand chunks, well within brute-force range.

use super::{rank_nearest, CollectionInfo, EntryMetadata, IndexedEntry, QueryHit, VectorIndex};
use crate::error::{Result, ScreenragError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS collections (
        name TEXT PRIMARY KEY,
        embedding_model TEXT NOT NULL,
        dimensions INTEGER NOT NULL,
        distance TEXT NOT NULL DEFAULT 'cosine',
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS entries (
        collection TEXT NOT NULL REFERENCES collections(name),
        id TEXT NOT NULL,
        document TEXT NOT NULL,
        embedding BLOB NOT NULL,
        film TEXT NOT NULL,
        scene_id INTEGER NOT NULL,
        heading TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        total_chunks INTEGER NOT NULL,
        PRIMARY KEY (collection, id)
    );
"#;

/// SQLite-based vector index.
pub struct SqliteVectorIndex {
    conn: Mutex<Connection>,
}

impl SqliteVectorIndex {
    /// Open (or create) an index database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector index at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory index (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ScreenragError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn collection_info(conn: &Connection, name: &str) -> Result<Option<CollectionInfo>> {
        let row = conn
            .query_row(
                "SELECT name, embedding_model, dimensions, created_at FROM collections WHERE name = ?1",
                params![name],
                |row| {
                    let created_at: String = row.get(3)?;
                    Ok(CollectionInfo {
                        name: row.get(0)?,
                        embedding_model: row.get(1)?,
                        dimensions: row.get::<_, i64>(2)? as usize,
                        created_at: DateTime::parse_from_rfc3339(&created_at)
                            .map(|dt| dt.with_timezone(&Utc))
                            .unwrap_or_else(|_| Utc::now()),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn require_collection(conn: &Connection, name: &str) -> Result<CollectionInfo> {
        Self::collection_info(conn, name)?
            .ok_or_else(|| ScreenragError::CollectionMissing(name.to_string()))
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let conn = self.lock()?;
        Self::collection_info(&conn, name)
    }

    #[instrument(skip(self))]
    async fn create_collection(
        &self,
        name: &str,
        embedding_model: &str,
        dimensions: usize,
    ) -> Result<CollectionInfo> {
        let conn = self.lock()?;
        if Self::collection_info(&conn, name)?.is_some() {
            return Err(ScreenragError::VectorStore(format!(
                "Collection '{}' already exists",
                name
            )));
        }

        let info = CollectionInfo {
            name: name.to_string(),
            embedding_model: embedding_model.to_string(),
            dimensions,
            created_at: Utc::now(),
        };

        conn.execute(
            r#"
            INSERT INTO collections (name, embedding_model, dimensions, distance, created_at)
            VALUES (?1, ?2, ?3, 'cosine', ?4)
            "#,
            params![
                info.name,
                info.embedding_model,
                info.dimensions as i64,
                info.created_at.to_rfc3339(),
            ],
        )?;

        info!("Created collection '{}' ({}, {} dims)", name, embedding_model, dimensions);
        Ok(info)
    }

    #[instrument(skip(self))]
    async fn delete_collection(&self, name: &str) -> Result<bool> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let entries = tx.execute("DELETE FROM entries WHERE collection = ?1", params![name])?;
        let existed = tx.execute("DELETE FROM collections WHERE name = ?1", params![name])? > 0;
        tx.commit()?;

        if existed {
            info!("Deleted collection '{}' with {} entries", name, entries);
        }
        Ok(existed)
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn add(&self, collection: &str, entries: &[IndexedEntry]) -> Result<usize> {
        let conn = self.lock()?;
        let info = Self::require_collection(&conn, collection)?;
        for entry in entries {
            info.check_dimensions(&entry.embedding)?;
        }

        let tx = conn.unchecked_transaction()?;
        for entry in entries {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO entries
                (collection, id, document, embedding, film, scene_id, heading, chunk_index, total_chunks)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    collection,
                    entry.id,
                    entry.document,
                    Self::embedding_to_bytes(&entry.embedding),
                    entry.metadata.film,
                    entry.metadata.scene_id,
                    entry.metadata.heading,
                    entry.metadata.chunk_index,
                    entry.metadata.total_chunks,
                ],
            )?;
        }
        tx.commit()?;

        debug!("Added {} entries to '{}'", entries.len(), collection);
        Ok(entries.len())
    }

    #[instrument(skip(self, embedding))]
    async fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<Vec<QueryHit>> {
        let conn = self.lock()?;
        let info = Self::require_collection(&conn, collection)?;
        info.check_dimensions(embedding)?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, document, embedding, film, scene_id, heading, chunk_index, total_chunks
            FROM entries
            WHERE collection = ?1
            "#,
        )?;

        let rows = stmt.query_map(params![collection], |row| {
            let embedding_bytes: Vec<u8> = row.get(2)?;
            Ok(IndexedEntry {
                id: row.get(0)?,
                document: row.get(1)?,
                embedding: Self::bytes_to_embedding(&embedding_bytes),
                metadata: EntryMetadata {
                    film: row.get(3)?,
                    scene_id: row.get(4)?,
                    heading: row.get(5)?,
                    chunk_index: row.get(6)?,
                    total_chunks: row.get(7)?,
                },
            })
        })?;

        let entries = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        let hits = rank_nearest(embedding, entries.iter(), k);

        debug!("Scanned {} entries, returning {}", entries.len(), hits.len());
        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let conn = self.lock()?;
        Self::require_collection(&conn, collection)?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    async fn ids(&self, collection: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        Self::require_collection(&conn, collection)?;

        let mut stmt = conn.prepare("SELECT id FROM entries WHERE collection = ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![collection], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}
