use crate::config::{Config, ProviderChoice};
use crate::error::{QnaError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Turns text into an embedding.
///
/// Injected into the service so tests can swap in a deterministic fake.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Backend name for logs
    fn name(&self) -> &str {
        "unknown"
    }
}

pub enum ProviderKind {
    /// Out-of-process script printing a JSON array on stdout
    Command { program: String, args: Vec<String> },
    Ollama { endpoint: String, model: String },
    OpenAI { api_key: String },
    /// Local feature hashing, no model required
    Hash { dimension: usize },
}

/// Embedding backend with output validation and a call timeout
pub struct EmbeddingProvider {
    kind: ProviderKind,
    dimension: Option<usize>,
    timeout: Duration,
    client: reqwest::Client,
}

impl EmbeddingProvider {
    pub fn new(kind: ProviderKind, dimension: Option<usize>, timeout: Duration) -> Self {
        Self {
            kind,
            dimension,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let kind = match config.provider {
            ProviderChoice::Command => {
                let (program, args) = config
                    .embed_command
                    .split_first()
                    .ok_or_else(|| QnaError::Config("embedding command is empty".into()))?;
                ProviderKind::Command {
                    program: program.clone(),
                    args: args.to_vec(),
                }
            }
            ProviderChoice::Ollama => ProviderKind::Ollama {
                endpoint: config.ollama_endpoint.trim_end_matches('/').to_string(),
                model: config.ollama_model.clone(),
            },
            ProviderChoice::OpenAI => {
                let api_key = config
                    .openai_api_key
                    .clone()
                    .ok_or_else(|| QnaError::Config("OPENAI_API_KEY not set".into()))?;
                ProviderKind::OpenAI { api_key }
            }
            ProviderChoice::Hash => ProviderKind::Hash {
                dimension: config.dimension.unwrap_or(super::EMBEDDING_DIM),
            },
        };

        let dimension = match kind {
            ProviderKind::Hash { dimension } => Some(dimension),
            _ => config.dimension,
        };

        Ok(Self::new(kind, dimension, config.timeout))
    }

    /// Expected embedding length, if pinned
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    async fn embed_unchecked(&self, text: &str) -> Result<Vec<f32>> {
        match &self.kind {
            ProviderKind::Command { program, args } => {
                self.embed_command(program, args, text).await
            }
            ProviderKind::Ollama { endpoint, model } => {
                self.embed_ollama(endpoint, model, text).await
            }
            ProviderKind::OpenAI { api_key } => self.embed_openai(api_key, text).await,
            ProviderKind::Hash { dimension } => Ok(hash_embedding(text, *dimension)),
        }
    }

    async fn embed_command(&self, program: &str, args: &[String], text: &str) -> Result<Vec<f32>> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .arg(text)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                QnaError::EmbeddingUnavailable(format!("failed to start {}: {}", program, e))
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let detail = stderr.trim();
            return Err(QnaError::EmbeddingUnavailable(if detail.is_empty() {
                format!("{} exited with {}", program, output.status)
            } else {
                detail.to_string()
            }));
        }
        if !stderr.trim().is_empty() {
            tracing::debug!(program, stderr = %stderr.trim(), "embedding command wrote to stderr");
        }

        parse_command_output(&String::from_utf8_lossy(&output.stdout), self.dimension)
    }

    async fn embed_ollama(&self, endpoint: &str, model: &str, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}/api/embeddings", endpoint))
            .json(&serde_json::json!({
                "model": model,
                "prompt": text,
            }))
            .send()
            .await
            .map_err(unreachable_provider)?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(QnaError::EmbeddingUnavailable(format!(
                "Ollama API error: {}",
                text
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| QnaError::EmbeddingParseError(e.to_string()))?;
        parse_ollama_response(&result, self.dimension)
    }

    async fn embed_openai(&self, api_key: &str, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&serde_json::json!({
                "model": "text-embedding-3-small",
                "input": text,
            }))
            .send()
            .await
            .map_err(unreachable_provider)?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(QnaError::EmbeddingUnavailable(format!(
                "OpenAI API error: {}",
                text
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| QnaError::EmbeddingParseError(e.to_string()))?;
        parse_openai_response(result, self.dimension)
    }
}

#[async_trait]
impl Embedder for EmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = tokio::time::timeout(self.timeout, self.embed_unchecked(text))
            .await
            .map_err(|_| QnaError::EmbeddingTimeout(self.timeout))??;
        validate_embedding(embedding, self.dimension)
    }

    fn name(&self) -> &str {
        match self.kind {
            ProviderKind::Command { .. } => "command",
            ProviderKind::Ollama { .. } => "ollama",
            ProviderKind::OpenAI { .. } => "openai",
            ProviderKind::Hash { .. } => "hash",
        }
    }
}

fn unreachable_provider(e: reqwest::Error) -> QnaError {
    QnaError::EmbeddingUnavailable(e.to_string())
}

/// Decode an Ollama `/api/embeddings` body: `{"embedding": [..]}`
pub fn parse_ollama_response(body: &serde_json::Value, dimension: Option<usize>) -> Result<Vec<f32>> {
    let embedding = body
        .get("embedding")
        .ok_or_else(|| QnaError::EmbeddingParseError("Ollama response has no embedding".into()))?;
    parse_embedding(embedding, dimension)
}

/// Decode an OpenAI `/v1/embeddings` body: `{"data": [{"embedding": [..]}, ..]}`
pub fn parse_openai_response(body: serde_json::Value, dimension: Option<usize>) -> Result<Vec<f32>> {
    #[derive(Deserialize)]
    struct EmbeddingResponse {
        data: Vec<EmbeddingData>,
    }

    #[derive(Deserialize)]
    struct EmbeddingData {
        embedding: serde_json::Value,
    }

    let result: EmbeddingResponse = serde_json::from_value(body)
        .map_err(|e| QnaError::EmbeddingParseError(format!("OpenAI response: {}", e)))?;
    let first = result
        .data
        .into_iter()
        .next()
        .ok_or_else(|| QnaError::EmbeddingParseError("No embedding returned".into()))?;
    parse_embedding(&first.embedding, dimension)
}

/// Find the first stdout line holding a JSON array and decode it.
///
/// Scripts commonly print progress lines after the vector, so anything that is
/// not an array is ignored.
pub fn parse_command_output(stdout: &str, dimension: Option<usize>) -> Result<Vec<f32>> {
    for line in stdout.lines() {
        let line = line.trim();
        if !line.starts_with('[') {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
            return parse_embedding(&value, dimension);
        }
    }
    Err(QnaError::EmbeddingParseError(
        "no JSON array found in provider output".into(),
    ))
}

/// Decode a JSON value into a validated embedding
pub fn parse_embedding(value: &serde_json::Value, dimension: Option<usize>) -> Result<Vec<f32>> {
    let items = value
        .as_array()
        .ok_or_else(|| QnaError::EmbeddingParseError("embedding is not an array".into()))?;

    let mut embedding = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let number = item.as_f64().ok_or_else(|| {
            QnaError::EmbeddingParseError(format!("element {} is not a number: {}", i, item))
        })?;
        embedding.push(number as f32);
    }

    validate_embedding(embedding, dimension)
}

/// Reject empty, non-finite or wrongly sized vectors
pub fn validate_embedding(embedding: Vec<f32>, dimension: Option<usize>) -> Result<Vec<f32>> {
    if embedding.is_empty() {
        return Err(QnaError::EmbeddingParseError("embedding is empty".into()));
    }
    if let Some(i) = embedding.iter().position(|x| !x.is_finite()) {
        return Err(QnaError::EmbeddingParseError(format!(
            "element {} is not finite",
            i
        )));
    }
    if let Some(expected) = dimension {
        if embedding.len() != expected {
            return Err(QnaError::EmbeddingParseError(format!(
                "expected {} dimensions, got {}",
                expected,
                embedding.len()
            )));
        }
    }
    Ok(embedding)
}

/// Signed feature hashing over lower-cased words, L2-normalised.
///
/// Each word's SHA-256 digest picks four buckets and a sign for each, so
/// texts sharing words point in similar directions. Text without words maps
/// to the zero vector.
pub fn hash_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimension];
    if dimension == 0 {
        return vector;
    }

    let words = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty());

    for word in words {
        let digest = Sha256::digest(word.as_bytes());
        for chunk in digest.chunks_exact(8).take(4) {
            let bucket = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as usize;
            let sign = if chunk[4] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket % dimension] += sign;
        }
    }

    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }

    vector
}
