use thiserror::Error;

use crate::embeddings::EmbeddingError;
use crate::llm::LlmError;
use crate::queue::QueueError;

#[derive(Error, Debug)]
pub enum PkosError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Language model error: {0}")]
    Llm(#[from] LlmError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PkosError>;
