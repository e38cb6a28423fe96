//! Audit subsystem: append-only change log for notes
//!
//! Audit writes must never fail the write they describe, so every function
//! here logs store errors and carries on.

use pkos_core::{AuditEntry, NewAuditEntry, NoteStore};
use uuid::Uuid;

pub const ACTION_CREATE: &str = "create";
pub const ACTION_UPDATE: &str = "update";
pub const ACTION_AI_PROCESS: &str = "ai_process";
pub const ACTION_LINK: &str = "link";
pub const ACTION_UNLINK: &str = "unlink";
pub const ACTION_AUTO_LINK: &str = "auto_link";

pub const DEFAULT_HISTORY_LIMIT: i64 = 10;
pub const DEFAULT_RECENT_LIMIT: i64 = 20;

/// Upper bound for caller-supplied limits.
pub const MAX_AUDIT_LIMIT: i64 = 200;

pub async fn log_note_change(
    store: &dyn NoteStore,
    note_id: Uuid,
    action: &str,
    changes: serde_json::Value,
    user_id: Option<Uuid>,
) {
    let entry = NewAuditEntry {
        note_id,
        action: action.to_string(),
        changes,
        user_id,
    };

    match store.append_audit(entry).await {
        Ok(_) => tracing::info!(note_id = %note_id, action = action, "Logged note change"),
        Err(e) => tracing::error!(note_id = %note_id, action = action, error = %e, "Error logging note change"),
    }
}

/// Newest first. Store errors yield an empty list.
pub async fn note_history(store: &dyn NoteStore, note_id: Uuid, limit: i64) -> Vec<AuditEntry> {
    match store.audit_history(note_id, clamp_limit(limit)).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!(note_id = %note_id, error = %e, "Error getting note history");
            Vec::new()
        }
    }
}

/// Newest first across all notes. Store errors yield an empty list.
pub async fn recent_changes(store: &dyn NoteStore, limit: i64) -> Vec<AuditEntry> {
    match store.recent_audit(clamp_limit(limit)).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!(error = %e, "Error getting recent changes");
            Vec::new()
        }
    }
}

fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_AUDIT_LIMIT)
}
