//! `SQLite`-backed vector store.
//!
//! Embeddings are stored as little-endian f32 BLOBs next to the chunk text.
//! Keyword search uses an FTS5 virtual table when the linked `SQLite`
//! supports it, with a pure-Rust term-frequency scan as fallback so the
//! keyword channel works everywhere.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use async_trait::async_trait;

use crate::domain::errors::{SibylError, SibylResult};
use crate::domain::models::{Chunk, DatabaseConfig, Document, IndexedRecord};
use crate::domain::ports::{ScoredRecord, StoreStats, VectorStore};

/// Keyword index implementation in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordIndex {
    /// Native FTS5 virtual table with bm25 ranking
    Fts5,
    /// Pure Rust term-frequency scan fallback
    TermScan,
}

/// Vector store backed by `SQLite`.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    dimension: usize,
    keyword_index: KeywordIndex,
}

impl SqliteVectorStore {
    /// Open (or create) the database at the configured path, run migrations,
    /// and detect keyword-index support.
    ///
    /// WAL journaling keeps readers on the previous snapshot while an
    /// ingestion transaction is in flight.
    pub async fn connect(config: &DatabaseConfig, dimension: usize) -> SibylResult<Self> {
        if let Some(parent) = Path::new(&config.path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SibylError::StoreUnavailable(format!(
                        "cannot create database directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", config.path))
            .map_err(|e| SibylError::Configuration(format!("database path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let keyword_index = Self::initialize_keyword_index(&pool).await;

        Ok(Self {
            pool,
            dimension,
            keyword_index,
        })
    }

    /// Create the FTS5 table if the linked `SQLite` supports it.
    ///
    /// The virtual table is created outside migrations because its
    /// availability depends on the build, not the schema version.
    async fn initialize_keyword_index(pool: &SqlitePool) -> KeywordIndex {
        let result = sqlx::query(
            "CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
                document_id UNINDEXED,
                chunk_index UNINDEXED,
                text
            )",
        )
        .execute(pool)
        .await;

        match result {
            Ok(_) => {
                info!("FTS5 available, keyword search uses bm25 ranking");
                KeywordIndex::Fts5
            }
            Err(e) => {
                warn!(error = %e, "FTS5 unavailable, keyword search falls back to term scan");
                KeywordIndex::TermScan
            }
        }
    }

    /// Which keyword index implementation is active.
    pub fn keyword_index(&self) -> KeywordIndex {
        self.keyword_index
    }

    /// Serialize an embedding to little-endian bytes for BLOB storage.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize an embedding from BLOB bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> SibylResult<Vec<f32>> {
        if bytes.len() % 4 != 0 {
            return Err(SibylError::StoreUnavailable(
                "corrupt embedding blob: length not a multiple of 4".to_string(),
            ));
        }

        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }

    /// Cosine similarity between two vectors of equal length.
    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
        if a.len() != b.len() {
            return -1.0;
        }

        let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
        let mag_a: f64 = a.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt();
        let mag_b: f64 = b.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt();

        if mag_a == 0.0 || mag_b == 0.0 {
            return -1.0;
        }

        dot / (mag_a * mag_b)
    }

    fn check_dimensions(&self, records: &[IndexedRecord]) -> SibylResult<()> {
        for record in records {
            if record.embedding.len() != self.dimension {
                return Err(SibylError::Configuration(format!(
                    "embedding for {}#{} has dimension {}, store expects {}",
                    record.chunk.document_id,
                    record.chunk.index,
                    record.embedding.len(),
                    self.dimension
                )));
            }
        }
        Ok(())
    }

    async fn write_record(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        record: &IndexedRecord,
        fts: KeywordIndex,
    ) -> SibylResult<()> {
        let index = i64::try_from(record.chunk.index)
            .map_err(|_| SibylError::StoreUnavailable("chunk index overflow".to_string()))?;

        sqlx::query(
            "INSERT INTO chunks (
                document_id, chunk_index, text, token_count, start_token,
                end_token, overlaps_previous, embedding, model_id, source_url, ingested_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(document_id, chunk_index) DO UPDATE SET
                text = excluded.text,
                token_count = excluded.token_count,
                start_token = excluded.start_token,
                end_token = excluded.end_token,
                overlaps_previous = excluded.overlaps_previous,
                embedding = excluded.embedding,
                model_id = excluded.model_id,
                source_url = excluded.source_url,
                ingested_at = excluded.ingested_at",
        )
        .bind(&record.chunk.document_id)
        .bind(index)
        .bind(&record.chunk.text)
        .bind(record.chunk.token_count as i64)
        .bind(record.chunk.start_token as i64)
        .bind(record.chunk.end_token as i64)
        .bind(record.chunk.overlaps_previous)
        .bind(Self::embedding_to_bytes(&record.embedding))
        .bind(&record.model_id)
        .bind(&record.source_url)
        .bind(record.ingested_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;

        if fts == KeywordIndex::Fts5 {
            sqlx::query("DELETE FROM chunks_fts WHERE document_id = ? AND chunk_index = ?")
                .bind(&record.chunk.document_id)
                .bind(index)
                .execute(&mut **tx)
                .await?;
            sqlx::query("INSERT INTO chunks_fts (document_id, chunk_index, text) VALUES (?, ?, ?)")
                .bind(&record.chunk.document_id)
                .bind(index)
                .bind(&record.chunk.text)
                .execute(&mut **tx)
                .await?;
        }

        Ok(())
    }

    async fn write_document_row(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        document: &Document,
    ) -> SibylResult<()> {
        sqlx::query(
            "INSERT INTO documents (id, source_url, version, ingested_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                source_url = excluded.source_url,
                version = excluded.version,
                ingested_at = excluded.ingested_at",
        )
        .bind(&document.id)
        .bind(&document.source_url)
        .bind(document.version)
        .bind(document.ingested_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> SibylResult<IndexedRecord> {
        let index: i64 = row.try_get("chunk_index")?;
        let token_count: i64 = row.try_get("token_count")?;
        let start_token: i64 = row.try_get("start_token")?;
        let end_token: i64 = row.try_get("end_token")?;
        let embedding_bytes: Vec<u8> = row.try_get("embedding")?;
        let ingested_at_raw: String = row.try_get("ingested_at")?;

        let ingested_at = DateTime::parse_from_rfc3339(&ingested_at_raw)
            .map_err(|e| {
                SibylError::StoreUnavailable(format!("corrupt ingested_at timestamp: {e}"))
            })?
            .with_timezone(&Utc);

        Ok(IndexedRecord {
            chunk: Chunk {
                document_id: row.try_get("document_id")?,
                index: index.unsigned_abs() as usize,
                text: row.try_get("text")?,
                token_count: token_count.unsigned_abs() as usize,
                start_token: start_token.unsigned_abs() as usize,
                end_token: end_token.unsigned_abs() as usize,
                overlaps_previous: row.try_get("overlaps_previous")?,
            },
            embedding: Self::bytes_to_embedding(&embedding_bytes)?,
            model_id: row.try_get("model_id")?,
            source_url: row.try_get("source_url")?,
            ingested_at,
        })
    }

    async fn all_records(&self) -> SibylResult<Vec<IndexedRecord>> {
        let rows = sqlx::query(
            "SELECT document_id, chunk_index, text, token_count, start_token,
                    end_token, overlaps_previous, embedding, model_id, source_url, ingested_at
             FROM chunks",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::record_from_row).collect()
    }

    async fn record_by_key(&self, document_id: &str, index: i64) -> SibylResult<Option<IndexedRecord>> {
        let row = sqlx::query(
            "SELECT document_id, chunk_index, text, token_count, start_token,
                    end_token, overlaps_previous, embedding, model_id, source_url, ingested_at
             FROM chunks WHERE document_id = ? AND chunk_index = ?",
        )
        .bind(document_id)
        .bind(index)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    /// Sort scored records by score descending, with deterministic
    /// tie-breaking: newest ingestion first, then document id, then chunk
    /// index.
    fn sort_scored(results: &mut [(IndexedRecord, f64)]) {
        results.sort_by(|(a, sa), (b, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.ingested_at.cmp(&a.ingested_at))
                .then_with(|| a.chunk.document_id.cmp(&b.chunk.document_id))
                .then_with(|| a.chunk.index.cmp(&b.chunk.index))
        });
    }

    /// Build an FTS5 MATCH expression from free text: terms quoted and
    /// OR-joined, punctuation stripped. Returns `None` for term-less input.
    fn fts_match_expression(query: &str) -> Option<String> {
        let terms: Vec<String> = query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| format!("\"{}\"", t.to_lowercase()))
            .collect();

        if terms.is_empty() {
            None
        } else {
            Some(terms.join(" OR "))
        }
    }

    async fn search_fts5(&self, query: &str, limit: usize) -> SibylResult<Vec<ScoredRecord>> {
        let Some(expression) = Self::fts_match_expression(query) else {
            return Ok(Vec::new());
        };

        // bm25 rank is ascending-better; negate so higher score = better
        let rows = sqlx::query(
            "SELECT document_id, chunk_index, rank FROM chunks_fts
             WHERE chunks_fts MATCH ?
             ORDER BY rank ASC, document_id ASC, chunk_index ASC
             LIMIT ?",
        )
        .bind(&expression)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            let document_id: String = row.try_get("document_id")?;
            let index: i64 = row.try_get("chunk_index")?;
            let rank: f64 = row.try_get("rank")?;

            // FTS rows without a chunks counterpart would indicate a sync
            // bug; skip rather than fail the whole search.
            if let Some(record) = self.record_by_key(&document_id, index).await? {
                results.push(ScoredRecord {
                    record,
                    score: -rank,
                });
            } else {
                warn!(document_id, index, "FTS row without matching chunk row");
            }
        }

        Ok(results)
    }

    async fn search_term_scan(&self, query: &str, limit: usize) -> SibylResult<Vec<ScoredRecord>> {
        let terms: Vec<String> = query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.all_records().await?;
        let mut scored: Vec<(IndexedRecord, f64)> = Vec::new();

        for record in records {
            let lowered = record.chunk.text.to_lowercase();
            let chunk_terms: Vec<&str> = lowered
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| !t.is_empty())
                .collect();

            if chunk_terms.is_empty() {
                continue;
            }

            let mut matches = 0usize;
            for term in &terms {
                matches += chunk_terms.iter().filter(|t| *t == term).count();
            }

            if matches > 0 {
                // Term frequency normalized by chunk length, so long chunks
                // do not dominate on raw occurrence count.
                let score = matches as f64 / chunk_terms.len() as f64;
                scored.push((record, score));
            }
        }

        Self::sort_scored(&mut scored);
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(record, score)| ScoredRecord { record, score })
            .collect())
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, records: &[IndexedRecord]) -> SibylResult<()> {
        self.check_dimensions(records)?;

        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for record in records {
            // New documents start at version 1; an upsert into an existing
            // document keeps its version (replace_document is what bumps it)
            sqlx::query(
                "INSERT INTO documents (id, source_url, version, ingested_at)
                VALUES (?, ?, 1, ?)
                ON CONFLICT(id) DO UPDATE SET
                    source_url = excluded.source_url,
                    ingested_at = excluded.ingested_at",
            )
            .bind(&record.chunk.document_id)
            .bind(&record.source_url)
            .bind(record.ingested_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;

            Self::write_record(&mut tx, record, self.keyword_index).await?;
        }

        tx.commit().await?;
        debug!(count = records.len(), "upserted records");
        Ok(())
    }

    async fn replace_document(
        &self,
        document: &Document,
        records: &[IndexedRecord],
    ) -> SibylResult<()> {
        self.check_dimensions(records)?;

        for record in records {
            if record.chunk.document_id != document.id {
                return Err(SibylError::Configuration(format!(
                    "record for document '{}' in replace of '{}'",
                    record.chunk.document_id, document.id
                )));
            }
        }

        let mut tx = self.pool.begin().await?;

        Self::write_document_row(&mut tx, document).await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(&document.id)
            .execute(&mut *tx)
            .await?;

        if self.keyword_index == KeywordIndex::Fts5 {
            sqlx::query("DELETE FROM chunks_fts WHERE document_id = ?")
                .bind(&document.id)
                .execute(&mut *tx)
                .await?;
        }

        for record in records {
            Self::write_record(&mut tx, record, self.keyword_index).await?;
        }

        tx.commit().await?;
        info!(
            document_id = %document.id,
            version = document.version,
            chunks = records.len(),
            "document replaced"
        );
        Ok(())
    }

    async fn delete_by_document(&self, document_id: &str) -> SibylResult<u64> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if self.keyword_index == KeywordIndex::Fts5 {
            sqlx::query("DELETE FROM chunks_fts WHERE document_id = ?")
                .bind(document_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted)
    }

    async fn nearest_by_vector(
        &self,
        query: &[f32],
        limit: usize,
    ) -> SibylResult<Vec<ScoredRecord>> {
        if query.len() != self.dimension {
            return Err(SibylError::Configuration(format!(
                "query vector has dimension {}, store expects {}",
                query.len(),
                self.dimension
            )));
        }

        let records = self.all_records().await?;
        let mut scored: Vec<(IndexedRecord, f64)> = records
            .into_iter()
            .map(|record| {
                let score = Self::cosine_similarity(query, &record.embedding);
                (record, score)
            })
            .collect();

        Self::sort_scored(&mut scored);
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(record, score)| ScoredRecord { record, score })
            .collect())
    }

    async fn search_by_keyword(
        &self,
        query: &str,
        limit: usize,
    ) -> SibylResult<Vec<ScoredRecord>> {
        match self.keyword_index {
            KeywordIndex::Fts5 => self.search_fts5(query, limit).await,
            KeywordIndex::TermScan => self.search_term_scan(query, limit).await,
        }
    }

    fn keyword_available(&self) -> bool {
        // Both index variants serve keyword queries; FTS5 is just faster.
        // The live variant is exposed separately via `keyword_index()`.
        true
    }

    async fn find_document(&self, document_id: &str) -> SibylResult<Option<Document>> {
        let row = sqlx::query("SELECT id, source_url, version, ingested_at FROM documents WHERE id = ?")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| {
            let ingested_at_raw: String = r.try_get("ingested_at")?;
            let ingested_at = DateTime::parse_from_rfc3339(&ingested_at_raw)
                .map_err(|e| {
                    SibylError::StoreUnavailable(format!("corrupt ingested_at timestamp: {e}"))
                })?
                .with_timezone(&Utc);
            Ok(Document {
                id: r.try_get("id")?,
                source_url: r.try_get("source_url")?,
                version: r.try_get("version")?,
                ingested_at,
            })
        })
        .transpose()
    }

    async fn recorded_model_id(&self) -> SibylResult<Option<String>> {
        let row = sqlx::query("SELECT model_id FROM chunks LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("model_id")))
    }

    async fn stats(&self) -> SibylResult<StoreStats> {
        let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            document_count: documents.unsigned_abs(),
            chunk_count: chunks.unsigned_abs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_round_trip() {
        let embedding = vec![0.25f32, -1.5, 3.0];
        let bytes = SqliteVectorStore::embedding_to_bytes(&embedding);
        let restored = SqliteVectorStore::bytes_to_embedding(&bytes).unwrap();
        assert_eq!(embedding, restored);
    }

    #[test]
    fn test_corrupt_blob_rejected() {
        let result = SqliteVectorStore::bytes_to_embedding(&[1, 2, 3]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cosine_similarity_identity() {
        let v = vec![0.6f32, 0.8];
        let similarity = SqliteVectorStore::cosine_similarity(&v, &v);
        assert!((similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0f32, 0.0];
        let b = vec![0.0f32, 1.0];
        let similarity = SqliteVectorStore::cosine_similarity(&a, &b);
        assert!(similarity.abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_mismatched_lengths() {
        let a = vec![1.0f32, 0.0];
        let b = vec![1.0f32];
        assert!((SqliteVectorStore::cosine_similarity(&a, &b) - (-1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_fts_match_expression_sanitizes() {
        let expression =
            SqliteVectorStore::fts_match_expression("what's the \"blackout\" window?").unwrap();
        assert_eq!(expression, "\"what\" OR \"s\" OR \"the\" OR \"blackout\" OR \"window\"");
    }

    #[test]
    fn test_fts_match_expression_empty() {
        assert!(SqliteVectorStore::fts_match_expression("?!...").is_none());
    }
}
