use std::sync::Arc;

use serde::Serialize;

use crate::embeddings::{Embedder, Record, RecordStore, SimilarityEngine};
use crate::error::{QnaError, Result};

/// Answer returned when the store has nothing to match against
pub const NO_ANSWER: &str = "No relevant answer found";
pub const ADDED_MESSAGE: &str = "Text and embedding added successfully";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddTextResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskResponse {
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedAnswer {
    pub text: String,
    pub score: f32,
}

/// Ingest and query operations over an injected store and embedder.
///
/// Cheap to clone; every request task gets its own handle.
#[derive(Clone)]
pub struct QnaService {
    store: Arc<dyn RecordStore>,
    embedder: Arc<dyn Embedder>,
}

impl QnaService {
    pub fn new(store: Arc<dyn RecordStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Embed `text` and persist it. Nothing is written if any step fails.
    pub async fn add_text(&self, text: &str) -> Result<AddTextResponse> {
        if text.trim().is_empty() {
            return Err(QnaError::EmptyText);
        }

        let embedding = self.embedder.embed(text).await?;
        let store = Arc::clone(&self.store);
        let owned = text.to_string();
        let record = blocking(move || store.append(&owned, embedding)).await?;
        tracing::info!(
            record = %record.id,
            dimension = record.dimension(),
            provider = self.embedder.name(),
            "stored text"
        );

        Ok(AddTextResponse {
            message: ADDED_MESSAGE.to_string(),
        })
    }

    /// Return the stored text closest to `question`
    pub async fn ask(&self, question: &str) -> Result<AskResponse> {
        let query = self.embed_question(question).await?;
        let records = self.snapshot().await?;

        let result = SimilarityEngine::best_match(&query, &records);
        tracing::info!(
            candidates = records.len(),
            score = result.score,
            matched = result.best.is_some(),
            "answered question"
        );

        Ok(AskResponse {
            answer: result.text().unwrap_or(NO_ANSWER).to_string(),
        })
    }

    /// The `top_k` closest stored texts with their scores, best first
    pub async fn ask_ranked(&self, question: &str, top_k: usize) -> Result<Vec<RankedAnswer>> {
        let query = self.embed_question(question).await?;
        let records = self.snapshot().await?;

        Ok(SimilarityEngine::rank(&query, &records, top_k)
            .into_iter()
            .map(|(score, record)| RankedAnswer {
                text: record.text.clone(),
                score,
            })
            .collect())
    }

    /// Store reads and fsyncs run on the blocking pool so request tasks keep
    /// yielding while another task holds the store lock
    async fn snapshot(&self) -> Result<Vec<Record>> {
        let store = Arc::clone(&self.store);
        blocking(move || store.all_records()).await
    }

    async fn embed_question(&self, question: &str) -> Result<Vec<f32>> {
        if question.trim().is_empty() {
            return Err(QnaError::EmptyText);
        }
        tracing::debug!(question, "embedding question");
        self.embedder.embed(question).await
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| QnaError::StoreUnavailable(format!("store task failed: {}", e)))?
}
