use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::EmbeddingError;
use crate::text::normalize_whitespace;

pub const DEFAULT_MODEL_ID: &str = "miniLM-L6-v2-local-v1";
pub const DEFAULT_MODEL_NAME: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_EMBEDDING_DIM: usize = 384;
pub const DEFAULT_NORMALIZATION: &str = "l2";
pub const DEFAULT_BACKEND: &str = "local-hash-v1";

/// Text to fixed-length vector. Implementations must be deterministic for a
/// given model id; retrieval results are only reproducible if they are.
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;

    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// One vector per input, in input order. Backends with a real batch path
    /// should override this.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticModelConfig {
    pub model_id: String,
    pub model_name: String,
    pub dimensions: usize,
    pub normalization: String,
    pub backend: String,
}

pub fn resolve_model_config(model_id: &str) -> SemanticModelConfig {
    let trimmed = model_id.trim();
    let resolved_id = if trimmed.is_empty() {
        DEFAULT_MODEL_ID
    } else {
        trimmed
    };

    let model_name = if resolved_id == DEFAULT_MODEL_ID {
        DEFAULT_MODEL_NAME
    } else {
        resolved_id
    };

    SemanticModelConfig {
        model_id: resolved_id.to_string(),
        model_name: model_name.to_string(),
        dimensions: DEFAULT_EMBEDDING_DIM,
        normalization: DEFAULT_NORMALIZATION.to_string(),
        backend: DEFAULT_BACKEND.to_string(),
    }
}

/// Feature-hashing embedder over word unigrams and adjacent bigrams,
/// L2-normalized. Runs offline and gives the retrieval core a deterministic
/// stand-in for a sentence-transformer model.
#[derive(Debug, Clone)]
pub struct LocalHashEmbedder {
    model_id: String,
    dimensions: usize,
}

impl LocalHashEmbedder {
    pub fn new(config: &SemanticModelConfig) -> Self {
        Self {
            model_id: config.model_id.clone(),
            dimensions: config.dimensions.max(8),
        }
    }
}

impl Default for LocalHashEmbedder {
    fn default() -> Self {
        Self::new(&resolve_model_config(DEFAULT_MODEL_ID))
    }
}

impl Embedder for LocalHashEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(embed_text_local(text, self.dimensions))
    }
}

pub fn embed_text_local(text: &str, dimensions: usize) -> Vec<f32> {
    let dims = dimensions.max(8);
    let mut vector = vec![0_f32; dims];

    for feature in hashed_features(text) {
        let hash = stable_hash(&feature);
        let index = (hash as usize) % dims;
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        let weight = 1.0 + (((hash >> 48) & 0xFF) as f32 / 255.0);
        vector[index] += sign * weight;
    }

    normalize_vector(&mut vector);
    vector
}

pub fn embedding_text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn encode_embedding_blob(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::<u8>::with_capacity(values.len() * 4);
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn decode_embedding_blob(blob: &[u8], expected_dim: usize) -> Option<Vec<f32>> {
    if expected_dim == 0 || blob.len() != expected_dim.saturating_mul(4) {
        return None;
    }

    Some(
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect::<Vec<f32>>(),
    )
}

/// First eight bytes of the SHA-256 digest, little-endian. Cached vectors are
/// keyed by model id only, so this must not change between builds.
fn stable_hash(value: &str) -> u64 {
    let digest = Sha256::digest(value.as_bytes());
    let mut prefix = [0_u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(prefix)
}

fn hashed_features(text: &str) -> Vec<String> {
    let words = normalize_whitespace(text)
        .split(' ')
        .map(|word| {
            word.chars()
                .filter(|character| character.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<String>>();

    let mut features = Vec::<String>::with_capacity(words.len() * 2);
    for (index, word) in words.iter().enumerate() {
        features.push(format!("w:{word}"));
        if let Some(next) = words.get(index + 1) {
            features.push(format!("b:{word}_{next}"));
        }
    }
    features
}

fn normalize_vector(values: &mut [f32]) {
    let norm = values
        .iter()
        .map(|value| f64::from(*value) * f64::from(*value))
        .sum::<f64>()
        .sqrt() as f32;

    if norm == 0.0 {
        return;
    }

    for value in values {
        *value /= norm;
    }
}
