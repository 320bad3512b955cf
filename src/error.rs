use thiserror::Error;

#[derive(Error, Debug)]
pub enum QnaError {
    #[error("text must not be empty")]
    EmptyText,

    #[error("embedding dimension mismatch: store holds {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding must not be empty")]
    EmptyEmbedding,

    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("could not parse embedding: {0}")]
    EmbeddingParseError(String),

    #[error("embedding provider timed out after {0:?}")]
    EmbeddingTimeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl QnaError {
    /// Status code used by the stdio service, mirroring the HTTP statuses the
    /// endpoints used to return.
    pub fn status_code(&self) -> i32 {
        match self {
            QnaError::EmptyText | QnaError::EmptyEmbedding | QnaError::DimensionMismatch { .. } => 400,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, QnaError>;
