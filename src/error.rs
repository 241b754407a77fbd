use thiserror::Error;

/// Failures raised by an embedding backend or the SQLite vector cache.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("embedding backend failed: {0}")]
    Backend(String),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding batch returned {actual} vectors for {expected} texts")]
    BatchLength { expected: usize, actual: usize },
    #[error("embedding cache failed: {0}")]
    Cache(String),
}

impl From<rusqlite::Error> for EmbeddingError {
    fn from(err: rusqlite::Error) -> Self {
        EmbeddingError::Cache(err.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    /// `search` was called on a lexical ranker before `build_index`.
    #[error("lexical index not built; call build_index() before search()")]
    IndexNotBuilt,
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Structural problems with a JATS document. Callers log these and fall back
/// to an empty result instead of failing the run.
#[derive(Debug, Clone, Error)]
pub enum DocumentError {
    #[error("failed to parse document xml: {0}")]
    Parse(String),
    #[error("document has no <body> element")]
    MissingBody,
}
