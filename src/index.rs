//! Persisted vector index backed by SQLite.
//!
//! The index exclusively owns embedding storage: the ingestion pipeline
//! appends [`ChunkRecord`]s, retrieval scans them. Vectors are stored as
//! little-endian f32 BLOBs. An empty index is a valid state — retrieval
//! over it returns no candidates.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

use crate::config::IndexConfig;
use crate::loader::Scope;

/// One persisted (vector, chunk + metadata) pair.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub content: String,
    /// Non-empty citation source; `"unknown"` when the loader left it unset.
    pub source: String,
    pub page: Option<i64>,
    pub scope: Scope,
    pub embedding: Vec<f32>,
}

/// Opens (creating if missing) the index database and ensures the schema.
pub async fn connect(config: &IndexConfig) -> Result<SqlitePool> {
    std::fs::create_dir_all(&config.dir)?;

    let db_path = config.db_path();
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            source TEXT NOT NULL,
            page INTEGER,
            scope TEXT NOT NULL,
            embedding BLOB NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}

/// Appends records in a single transaction.
pub async fn append(pool: &SqlitePool, records: &[ChunkRecord]) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    for record in records {
        sqlx::query(
            r#"
            INSERT INTO chunks (id, content, source, page, scope, embedding, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.content)
        .bind(&record.source)
        .bind(record.page)
        .bind(record.scope.as_str())
        .bind(vec_to_blob(&record.embedding))
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Number of persisted chunks. Zero means the index is not ready.
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

/// Loads every stored record with its decoded embedding.
///
/// Retrieval is a brute-force cosine scan, so the candidate set is the
/// whole table. Insertion order is preserved for stable tie-breaking.
pub async fn load_all(pool: &SqlitePool) -> Result<Vec<ChunkRecord>> {
    let rows = sqlx::query(
        "SELECT id, content, source, page, scope, embedding FROM chunks ORDER BY rowid",
    )
    .fetch_all(pool)
    .await?;

    let records = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let scope_str: String = row.get("scope");
            ChunkRecord {
                id: row.get("id"),
                content: row.get("content"),
                source: row.get("source"),
                page: row.get("page"),
                scope: scope_str.parse().unwrap_or(Scope::Unknown),
                embedding: blob_to_vec(&blob),
            }
        })
        .collect();

    Ok(records)
}

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in [-1, 1]; 0.0 for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
