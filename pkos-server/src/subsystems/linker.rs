//! Linker subsystem: note-to-note edges
//!
//! Edges are directed in storage (`links` outgoing, `linkedTo` incoming) but
//! treated as symmetric here: auto-link writes both directions, unlink
//! removes both, and `linked_notes` merges the two sides.

use std::collections::HashSet;

use anyhow::Result;
use pkos_core::Note;
use uuid::Uuid;

use crate::state::AppState;
use crate::subsystems::{audit, embedder};

/// Outcome of a link operation whose endpoints may not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    AlreadyLinked,
    Removed,
    NotLinked,
    SourceMissing,
    TargetMissing,
}

/// Create `source -> target`. Idempotent.
pub async fn create_link(state: &AppState, source: Uuid, target: Uuid) -> Result<LinkOutcome> {
    if state.store.fetch(source).await?.is_none() {
        return Ok(LinkOutcome::SourceMissing);
    }
    if state.store.fetch(target).await?.is_none() {
        return Ok(LinkOutcome::TargetMissing);
    }

    if !state.store.add_link(source, target).await? {
        tracing::debug!(source = %source, target = %target, "Link already exists");
        return Ok(LinkOutcome::AlreadyLinked);
    }

    tracing::info!(source = %source, target = %target, "Link created");
    audit::log_note_change(
        state.store.as_ref(),
        source,
        audit::ACTION_LINK,
        serde_json::json!({ "target": target }),
        None,
    )
    .await;
    Ok(LinkOutcome::Created)
}

/// Remove the edge between `source` and `target` in both directions.
pub async fn remove_link(state: &AppState, source: Uuid, target: Uuid) -> Result<LinkOutcome> {
    if state.store.fetch(source).await?.is_none() {
        return Ok(LinkOutcome::SourceMissing);
    }

    let forward = state.store.remove_link(source, target).await?;
    let reverse = state.store.remove_link(target, source).await?;
    if !forward && !reverse {
        return Ok(LinkOutcome::NotLinked);
    }

    tracing::info!(source = %source, target = %target, "Link removed");
    audit::log_note_change(
        state.store.as_ref(),
        source,
        audit::ACTION_UNLINK,
        serde_json::json!({ "target": target }),
        None,
    )
    .await;
    Ok(LinkOutcome::Removed)
}

/// Outgoing then incoming neighbours, each note once.
pub async fn linked_notes(state: &AppState, id: Uuid) -> Result<Vec<Note>> {
    let outgoing = state.store.outgoing_links(id).await?;
    let incoming = state.store.incoming_links(id).await?;

    let mut seen = HashSet::new();
    Ok(outgoing
        .into_iter()
        .chain(incoming)
        .filter(|n| seen.insert(n.id))
        .collect())
}

/// Link `id` to its nearest neighbours in both directions.
///
/// Returns the notes that were linked (including ones already linked), or
/// `None` when `id` does not exist. Never links a note to itself.
pub async fn auto_link(state: &AppState, id: Uuid) -> Result<Option<Vec<Note>>> {
    let Some(note) = state.store.fetch(id).await? else {
        return Ok(None);
    };

    let limit = i64::from(state.config.linking.auto_link_limit.max(1));
    let max_distance = state.config.linking.auto_link_max_distance;

    let hits = match embedder::semantic_search(state, &note.content, limit).await {
        Ok(hits) => hits,
        Err(e) => {
            tracing::warn!(id = %id, error = %e, "Auto-link search failed");
            return Ok(Some(Vec::new()));
        }
    };

    let mut linked = Vec::new();
    for hit in hits {
        if hit.id == id {
            continue;
        }
        if max_distance.is_some_and(|max| hit.distance > max) {
            continue;
        }
        let Some(target) = state.store.fetch(hit.id).await? else {
            continue;
        };

        state.store.add_link(id, target.id).await?;
        state.store.add_link(target.id, id).await?;
        linked.push(target);
    }

    tracing::info!(id = %id, linked = linked.len(), "Auto-link complete");
    if !linked.is_empty() {
        let targets: Vec<Uuid> = linked.iter().map(|n| n.id).collect();
        audit::log_note_change(
            state.store.as_ref(),
            id,
            audit::ACTION_AUTO_LINK,
            serde_json::json!({ "targets": targets }),
            None,
        )
        .await;
    }

    Ok(Some(linked))
}
