// Library interface for qna

pub mod cli;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod server;
pub mod service;

// Re-export commonly used types
pub use config::Config;
pub use error::{QnaError, Result};
pub use service::QnaService;
