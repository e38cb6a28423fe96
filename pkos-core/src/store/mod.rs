//! Note repository
//!
//! `NoteStore` is the seam between the services and persistence. The
//! Postgres implementation is the production path; the in-memory one backs
//! tests and `database.backend = "memory"`.

mod memory;
mod postgres;

pub use memory::MemoryNoteStore;
pub use postgres::PgNoteStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{AuditEntry, NewAuditEntry, NewNote, Note, NoteFilter, NoteUpdate, ScoredNote};

#[async_trait]
pub trait NoteStore: Send + Sync {
    // ---- notes ----

    async fn insert(&self, note: NewNote) -> Result<Note>;

    async fn fetch(&self, id: Uuid) -> Result<Option<Note>>;

    /// Write the fields present in `update` and bump `updated_at`.
    /// `Ok(None)` when the note does not exist.
    async fn update(&self, id: Uuid, update: &NoteUpdate) -> Result<Option<Note>>;

    /// Delete the note together with its links and audit rows.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Pinned first, then newest first.
    async fn list(&self, filter: &NoteFilter) -> Result<Vec<Note>>;

    // ---- vectors ----

    async fn set_embedding(&self, id: Uuid, embedding: Vec<f32>) -> Result<bool>;

    /// Notes with an embedding, ordered by L2 distance to `query`.
    async fn nearest(&self, query: &[f32], limit: i64) -> Result<Vec<ScoredNote>>;

    // ---- links ----

    /// Insert the directed edge; `false` if it already existed.
    async fn add_link(&self, source: Uuid, target: Uuid) -> Result<bool>;

    async fn remove_link(&self, source: Uuid, target: Uuid) -> Result<bool>;

    async fn outgoing_links(&self, id: Uuid) -> Result<Vec<Note>>;

    async fn incoming_links(&self, id: Uuid) -> Result<Vec<Note>>;

    // ---- audit ----

    async fn append_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry>;

    /// Newest first.
    async fn audit_history(&self, note_id: Uuid, limit: i64) -> Result<Vec<AuditEntry>>;

    /// Newest first, across all notes.
    async fn recent_audit(&self, limit: i64) -> Result<Vec<AuditEntry>>;

    fn name(&self) -> &str;
}
