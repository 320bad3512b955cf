pub mod add;
pub mod ask;
pub mod serve;
pub mod stats;

use std::sync::Arc;

use qna::embeddings::{EmbeddingProvider, FileStore, MemoryStore, RecordStore};
use qna::error::{QnaError, Result};
use qna::{Config, QnaService};

/// Wire the configured provider to a file store, or to a memory store when
/// `ephemeral` is set
pub fn open_service(config: &Config, ephemeral: bool) -> Result<QnaService> {
    let provider = EmbeddingProvider::from_config(config)?;

    let store: Arc<dyn RecordStore> = if ephemeral {
        match provider.dimension() {
            Some(dimension) => Arc::new(MemoryStore::with_dimension(dimension)),
            None => Arc::new(MemoryStore::new()),
        }
    } else {
        Arc::new(FileStore::open(&config.store_path, provider.dimension())?)
    };

    Ok(QnaService::new(store, Arc::new(provider)))
}

pub fn current_thread_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| QnaError::Config(format!("tokio runtime: {}", e)))
}
