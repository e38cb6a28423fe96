//! Embedder subsystem: keeps `notes.embedding` in step with note content
//!
//! - Loads the local ONNX model
//! - Re-embeds a note after create (queued) or content update (inline)
//! - Runs nearest-neighbour queries for search and auto-linking

use anyhow::Result;
use pkos_core::{
    embeddings::{self, EmbeddingBackend, EmbeddingError, OnnxConfig},
    onnx_embedder, OnnxEmbeddingClient, PkosConfig, ScoredNote,
};
use uuid::Uuid;

use crate::state::AppState;

/// Load the ONNX embedding model named by `[embedding]`.
pub fn create_backend_from_config(
    config: &PkosConfig,
) -> Result<Box<dyn EmbeddingBackend>, EmbeddingError> {
    let settings = &config.embedding;
    let (model_path, tokenizer_path) = onnx_embedder::resolve_onnx_paths(&settings.onnx_model_path);

    let client = OnnxEmbeddingClient::new(OnnxConfig {
        model_path,
        tokenizer_path,
        dimensions: settings.dimensions as usize,
    })?;
    Ok(Box::new(client))
}

/// Recompute and store the embedding for note `id`.
///
/// Uses `text` when given, otherwise the note's stored content. Returns
/// `Ok(false)` and leaves the stored vector untouched when the note is gone,
/// no backend is configured, the content is blank, or the backend produced
/// no vector.
pub async fn update_note_embedding(state: &AppState, id: Uuid, text: Option<&str>) -> Result<bool> {
    let Some(backend) = state.embedder.as_deref() else {
        tracing::debug!(id = %id, "No embedding backend configured, skipping");
        return Ok(false);
    };

    let content = match text {
        Some(t) => t.to_string(),
        None => match state.store.fetch(id).await? {
            Some(note) => note.content,
            None => {
                tracing::debug!(id = %id, "Note not found, skipping embedding");
                return Ok(false);
            }
        },
    };

    let Some(text) = embeddings::embeddable_text(&content) else {
        tracing::debug!(id = %id, "Blank content, keeping previous embedding");
        return Ok(false);
    };

    match backend.embed(text).await {
        Ok(Some(embedding)) => {
            let stored = state.store.set_embedding(id, embedding).await?;
            if stored {
                tracing::info!(id = %id, backend = backend.name(), "Successfully embedded note");
            }
            Ok(stored)
        }
        Ok(None) => {
            tracing::info!(
                id = %id,
                backend = backend.name(),
                "No vector produced, keeping previous embedding"
            );
            Ok(false)
        }
        Err(e) => {
            tracing::error!(id = %id, error = %e, "Failed to generate embedding");
            Err(e.into())
        }
    }
}

/// Embed `query` and return the nearest notes by L2 distance. A blank query matches nothing.
pub async fn semantic_search(state: &AppState, query: &str, limit: i64) -> Result<Vec<ScoredNote>> {
    let Some(backend) = state.embedder.as_deref() else {
        tracing::debug!("No embedding backend configured, search returns nothing");
        return Ok(Vec::new());
    };

    let Some(query) = embeddings::embeddable_text(query) else {
        return Ok(Vec::new());
    };

    let Some(vector) = backend.embed_query(query).await? else {
        return Ok(Vec::new());
    };

    Ok(state.store.nearest(&vector, limit).await?)
}
