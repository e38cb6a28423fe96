//! Embedding backends for note content
//!
//! A backend turns note text into a fixed-width vector for the
//! `notes.embedding` column. The only production backend is the local ONNX
//! `all-MiniLM-L6-v2` model in `onnx_embedder`.
//!
//! `embed` returning `Ok(None)` means "no vector for this text": the caller
//! keeps whatever embedding the note already has.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Width of the `notes.embedding` column.
pub const EMBEDDING_DIMENSIONS: usize = 384;

#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError>;

    /// Embed a search query. Defaults to `embed`.
    async fn embed_query(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        self.embed(text).await
    }

    fn dimensions(&self) -> usize;

    /// Backend name for logging and `/health`.
    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Invalid embedding: expected {expected} dimensions, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },

    #[error("ONNX model not found at {path}")]
    ModelNotFound { path: String },

    #[error("ONNX inference error: {0}")]
    OnnxInference(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
}

/// Paths and width for the local model.
#[derive(Debug, Clone)]
pub struct OnnxConfig {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub dimensions: usize,
}

/// The part of a note's content worth embedding, or `None` for blank notes.
///
/// A blank note has no meaningful position in the vector space, so it keeps
/// its previous embedding (or stays without one).
pub fn embeddable_text(content: &str) -> Option<&str> {
    let trimmed = content.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Reject a vector that would not fit the embedding column.
pub fn check_dimensions(vector: Vec<f32>, expected: usize) -> Result<Vec<f32>, EmbeddingError> {
    if vector.len() != expected {
        return Err(EmbeddingError::InvalidDimensions {
            expected,
            actual: vector.len(),
        });
    }
    Ok(vector)
}
