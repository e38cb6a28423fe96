//! Notes subsystem: CRUD over the note store
//!
//! Creating a note queues enrichment and embedding for the worker. Updating
//! content re-embeds inline. Queue, embedding, and audit failures are logged
//! and never fail the write itself.

use anyhow::Result;
use pkos_core::queue::enqueue_task;
use pkos_core::{NewNote, Note, NoteFilter, NoteUpdate, Task};
use uuid::Uuid;

use crate::state::AppState;
use crate::subsystems::{audit, embedder};

pub const DEFAULT_SEARCH_LIMIT: i64 = 5;
pub const MAX_SEARCH_LIMIT: i64 = 50;

pub fn clamp_search_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT)
}

pub async fn create_note(state: &AppState, new: NewNote) -> Result<Note> {
    let note = state.store.insert(new).await?;
    tracing::info!(id = %note.id, tags = note.tags.len(), "Note created");

    audit::log_note_change(
        state.store.as_ref(),
        note.id,
        audit::ACTION_CREATE,
        serde_json::json!({ "content": note.content, "tags": note.tags }),
        None,
    )
    .await;

    for task in [
        Task::ProcessNote { note_id: note.id },
        Task::UpdateEmbedding { note_id: note.id },
    ] {
        if let Err(e) = enqueue_task(state.queue.as_ref(), &task).await {
            tracing::warn!(id = %note.id, task = task.kind(), error = %e, "Failed to enqueue task");
        }
    }

    Ok(note)
}

pub async fn get_note(state: &AppState, id: Uuid) -> Result<Option<Note>> {
    Ok(state.store.fetch(id).await?)
}

/// Apply `update`; `Ok(None)` when the note does not exist. An empty update
/// returns the note untouched, with no audit row.
pub async fn update_note(state: &AppState, id: Uuid, update: &NoteUpdate) -> Result<Option<Note>> {
    apply_update(state, id, update, audit::ACTION_UPDATE).await
}

/// Shared by user updates and AI enrichment, which differ only in the audit action.
pub(crate) async fn apply_update(
    state: &AppState,
    id: Uuid,
    update: &NoteUpdate,
    action: &str,
) -> Result<Option<Note>> {
    if update.is_empty() {
        return Ok(state.store.fetch(id).await?);
    }

    let Some(note) = state.store.update(id, update).await? else {
        return Ok(None);
    };

    if let Some(content) = &update.content {
        // Separate statement from the update; a failure leaves the old vector in place.
        if let Err(e) = embedder::update_note_embedding(state, id, Some(content)).await {
            tracing::warn!(id = %id, error = %e, "Re-embedding after content update failed");
        }
    }

    let fields = update.changed_fields();
    tracing::info!(id = %id, fields = ?fields, action = action, "Note updated");
    audit::log_note_change(
        state.store.as_ref(),
        id,
        action,
        serde_json::json!({ "fields": fields }),
        None,
    )
    .await;

    Ok(Some(note))
}

pub async fn delete_note(state: &AppState, id: Uuid) -> Result<bool> {
    let deleted = state.store.delete(id).await?;
    if deleted {
        tracing::info!(id = %id, "Note deleted");
    }
    Ok(deleted)
}

pub async fn list_notes(state: &AppState, filter: &NoteFilter) -> Result<Vec<Note>> {
    Ok(state.store.list(filter).await?)
}

/// Semantic search. Embedding failures degrade to an empty result.
pub async fn search_notes(state: &AppState, query: &str, limit: i64) -> Result<Vec<Note>> {
    let hits = match embedder::semantic_search(state, query, limit).await {
        Ok(hits) => hits,
        Err(e) => {
            tracing::warn!(error = %e, "Semantic search failed, returning no results");
            return Ok(Vec::new());
        }
    };

    let mut notes = Vec::with_capacity(hits.len());
    for hit in hits {
        // A note deleted between the vector query and this fetch is dropped.
        if let Some(note) = state.store.fetch(hit.id).await? {
            notes.push(note);
        }
    }
    Ok(notes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_search_limit() {
        assert_eq!(clamp_search_limit(None), 5);
        assert_eq!(clamp_search_limit(Some(0)), 1);
        assert_eq!(clamp_search_limit(Some(-3)), 1);
        assert_eq!(clamp_search_limit(Some(12)), 12);
        assert_eq!(clamp_search_limit(Some(500)), 50);
    }
}
