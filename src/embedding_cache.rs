use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::embedding::{
    Embedder, decode_embedding_blob, embedding_text_hash, encode_embedding_blob,
};
use crate::error::EmbeddingError;

/// Persists vectors from an inner embedder in SQLite, keyed by model id and
/// the SHA-256 of the text. Hits return exactly what the inner embedder
/// produced, so wrapping an embedder never changes retrieval results.
pub struct CachedEmbedder<E> {
    inner: E,
    connection: Mutex<Connection>,
}

impl<E: Embedder> CachedEmbedder<E> {
    pub fn open(path: &Path, inner: E) -> Result<Self, EmbeddingError> {
        let connection = Connection::open(path)?;
        connection.pragma_update(None, "journal_mode", "WAL")?;
        connection.pragma_update(None, "synchronous", "NORMAL")?;
        Self::with_connection(connection, inner)
    }

    pub fn in_memory(inner: E) -> Result<Self, EmbeddingError> {
        Self::with_connection(Connection::open_in_memory()?, inner)
    }

    fn with_connection(connection: Connection, inner: E) -> Result<Self, EmbeddingError> {
        connection.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS embedding_cache(
              model_id TEXT NOT NULL,
              text_hash TEXT NOT NULL,
              embedding BLOB NOT NULL,
              embedding_dim INTEGER NOT NULL,
              generated_at TEXT NOT NULL,
              PRIMARY KEY(model_id, text_hash)
            );
            ",
        )?;

        Ok(Self {
            inner,
            connection: Mutex::new(connection),
        })
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn cached_count(&self) -> Result<usize, EmbeddingError> {
        let connection = self.lock()?;
        let count = connection.query_row(
            "SELECT COUNT(*) FROM embedding_cache WHERE model_id = ?1",
            params![self.inner.model_id()],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(count as usize)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, EmbeddingError> {
        self.connection
            .lock()
            .map_err(|_| EmbeddingError::Cache("embedding cache lock poisoned".to_string()))
    }

    fn lookup(
        &self,
        connection: &Connection,
        text_hash: &str,
    ) -> Result<Option<Vec<f32>>, EmbeddingError> {
        let blob = connection
            .query_row(
                "
                SELECT embedding
                FROM embedding_cache
                WHERE model_id = ?1 AND text_hash = ?2
                LIMIT 1
                ",
                params![self.inner.model_id(), text_hash],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;

        // Rows written with another dimensionality are treated as misses.
        Ok(blob.and_then(|blob| decode_embedding_blob(&blob, self.inner.dimensions())))
    }

    fn validate(&self, vector: &[f32]) -> Result<(), EmbeddingError> {
        let expected = self.inner.dimensions();
        if vector.len() != expected {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

fn upsert_embedding(
    connection: &Connection,
    model_id: &str,
    text_hash: &str,
    vector: &[f32],
    generated_at: &str,
) -> Result<(), EmbeddingError> {
    connection.execute(
        "
        INSERT INTO embedding_cache(model_id, text_hash, embedding, embedding_dim, generated_at)
        VALUES(?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(model_id, text_hash) DO UPDATE SET
          embedding=excluded.embedding,
          embedding_dim=excluded.embedding_dim,
          generated_at=excluded.generated_at
        ",
        params![
            model_id,
            text_hash,
            encode_embedding_blob(vector),
            vector.len() as i64,
            generated_at,
        ],
    )?;
    Ok(())
}

fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl<E: Embedder> Embedder for CachedEmbedder<E> {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let text_hash = embedding_text_hash(text);
        if let Some(vector) = self.lookup(&*self.lock()?, &text_hash)? {
            return Ok(vector);
        }

        let vector = self.inner.embed(text)?;
        self.validate(&vector)?;
        upsert_embedding(
            &*self.lock()?,
            self.inner.model_id(),
            &text_hash,
            &vector,
            &now_utc_string(),
        )?;
        Ok(vector)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let hashes = texts
            .iter()
            .map(|text| embedding_text_hash(text))
            .collect::<Vec<String>>();

        let mut vectors = Vec::<Option<Vec<f32>>>::with_capacity(texts.len());
        {
            let connection = self.lock()?;
            for text_hash in &hashes {
                vectors.push(self.lookup(&connection, text_hash)?);
            }
        }

        let miss_positions = vectors
            .iter()
            .enumerate()
            .filter(|(_, vector)| vector.is_none())
            .map(|(position, _)| position)
            .collect::<Vec<usize>>();

        if !miss_positions.is_empty() {
            let miss_texts = miss_positions
                .iter()
                .map(|position| texts[*position])
                .collect::<Vec<&str>>();
            let embedded = self.inner.embed_batch(&miss_texts)?;
            if embedded.len() != miss_texts.len() {
                return Err(EmbeddingError::BatchLength {
                    expected: miss_texts.len(),
                    actual: embedded.len(),
                });
            }
            for vector in &embedded {
                self.validate(vector)?;
            }

            let generated_at = now_utc_string();
            let mut connection = self.lock()?;
            let tx = connection.transaction()?;
            for (position, vector) in miss_positions.iter().zip(embedded) {
                upsert_embedding(
                    &tx,
                    self.inner.model_id(),
                    &hashes[*position],
                    &vector,
                    &generated_at,
                )?;
                vectors[*position] = Some(vector);
            }
            tx.commit()?;
        }

        debug!(
            text_count = texts.len(),
            miss_count = miss_positions.len(),
            model_id = self.inner.model_id(),
            "embedding cache batch resolved"
        );

        Ok(vectors.into_iter().flatten().collect::<Vec<Vec<f32>>>())
    }
}
