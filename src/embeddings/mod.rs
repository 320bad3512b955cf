pub mod provider;
pub mod search;
pub mod store;

pub use provider::{Embedder, EmbeddingProvider};
pub use search::{QueryResult, SimilarityEngine};
pub use store::{FileStore, MemoryStore, RecordStore};

use sha2::{Digest, Sha256};

/// Default embedding dimension (all-MiniLM-L6-v2, the model the bundled script loads)
pub const EMBEDDING_DIM: usize = 384;

/// A stored text snippet with its embedding
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Record {
    pub id: String,
    pub text: String,
    /// Missing on disk decodes as empty, which scores as an absent vector
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub created_at: String,
}

impl Record {
    pub fn new(text: String, embedding: Vec<f32>) -> Self {
        Self {
            id: generate_record_id(&text),
            text,
            embedding,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

/// Cosine similarity between two vectors.
///
/// Mismatched lengths, empty vectors and zero-magnitude vectors all score 0.0,
/// as does any non-finite result.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    let similarity = dot_product / (magnitude_a * magnitude_b);
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}

fn generate_record_id(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}
