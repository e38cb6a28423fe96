use async_trait::async_trait;
use pgvector::Vector;
use sqlx::PgPool;
use uuid::Uuid;

use super::NoteStore;
use crate::error::Result;
use crate::models::{AuditEntry, NewAuditEntry, NewNote, Note, NoteFilter, NoteUpdate, ScoredNote};

const NOTE_COLUMNS: &str = "id, title, content, summary, tags, is_archived, is_pinned, metadata, created_at, updated_at";

#[derive(Clone)]
pub struct PgNoteStore {
    pool: PgPool,
}

impl PgNoteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NoteStore for PgNoteStore {
    async fn insert(&self, note: NewNote) -> Result<Note> {
        let row = sqlx::query_as::<_, Note>(&format!(
            r#"
            INSERT INTO notes (content, tags, title, metadata)
            VALUES ($1, $2, $3, COALESCE($4, '{{}}'::jsonb))
            RETURNING {NOTE_COLUMNS}
            "#
        ))
        .bind(&note.content)
        .bind(&note.tags)
        .bind(&note.title)
        .bind(&note.metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Note>> {
        let row = sqlx::query_as::<_, Note>(&format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update(&self, id: Uuid, update: &NoteUpdate) -> Result<Option<Note>> {
        // COALESCE keeps columns whose bind is NULL; every update field is non-nullable on the wire.
        let row = sqlx::query_as::<_, Note>(&format!(
            r#"
            UPDATE notes SET
                content     = COALESCE($2, content),
                summary     = COALESCE($3, summary),
                tags        = COALESCE($4, tags),
                title       = COALESCE($5, title),
                is_archived = COALESCE($6, is_archived),
                is_pinned   = COALESCE($7, is_pinned),
                metadata    = COALESCE($8, metadata),
                updated_at  = now()
            WHERE id = $1
            RETURNING {NOTE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.content)
        .bind(&update.summary)
        .bind(&update.tags)
        .bind(&update.title)
        .bind(update.is_archived)
        .bind(update.is_pinned)
        .bind(&update.metadata)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        // note_links and note_audit_logs cascade on the foreign keys.
        let result = sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &NoteFilter) -> Result<Vec<Note>> {
        let rows = sqlx::query_as::<_, Note>(&format!(
            r#"
            SELECT {NOTE_COLUMNS}
            FROM notes
            WHERE ($1 OR NOT is_archived)
              AND ($2::text IS NULL OR $2 = ANY(tags))
            ORDER BY is_pinned DESC, created_at DESC
            "#
        ))
        .bind(filter.include_archived)
        .bind(&filter.tag)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn set_embedding(&self, id: Uuid, embedding: Vec<f32>) -> Result<bool> {
        let vector = Vector::from(embedding);
        let result = sqlx::query("UPDATE notes SET embedding = $1 WHERE id = $2")
            .bind(&vector)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn nearest(&self, query: &[f32], limit: i64) -> Result<Vec<ScoredNote>> {
        let vector = Vector::from(query.to_vec());
        let rows = sqlx::query_as::<_, ScoredNote>(
            r#"
            SELECT id, (embedding <-> $1::vector)::float8 AS distance
            FROM notes
            WHERE embedding IS NOT NULL
            ORDER BY embedding <-> $1::vector
            LIMIT $2
            "#,
        )
        .bind(&vector)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn add_link(&self, source: Uuid, target: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO note_links (source_id, target_id)
            VALUES ($1, $2)
            ON CONFLICT (source_id, target_id) DO NOTHING
            "#,
        )
        .bind(source)
        .bind(target)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_link(&self, source: Uuid, target: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM note_links WHERE source_id = $1 AND target_id = $2")
            .bind(source)
            .bind(target)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn outgoing_links(&self, id: Uuid) -> Result<Vec<Note>> {
        let rows = sqlx::query_as::<_, Note>(&format!(
            r#"
            SELECT {cols}
            FROM note_links l
            JOIN notes n ON n.id = l.target_id
            WHERE l.source_id = $1
            ORDER BY l.created_at
            "#,
            cols = prefixed_columns("n")
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn incoming_links(&self, id: Uuid) -> Result<Vec<Note>> {
        let rows = sqlx::query_as::<_, Note>(&format!(
            r#"
            SELECT {cols}
            FROM note_links l
            JOIN notes n ON n.id = l.source_id
            WHERE l.target_id = $1
            ORDER BY l.created_at
            "#,
            cols = prefixed_columns("n")
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn append_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry> {
        let row = sqlx::query_as::<_, AuditEntry>(
            r#"
            INSERT INTO note_audit_logs (note_id, action, changes, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, note_id, action, changes, created_at, user_id
            "#,
        )
        .bind(entry.note_id)
        .bind(&entry.action)
        .bind(&entry.changes)
        .bind(entry.user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn audit_history(&self, note_id: Uuid, limit: i64) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, note_id, action, changes, created_at, user_id
            FROM note_audit_logs
            WHERE note_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(note_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn recent_audit(&self, limit: i64) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, note_id, action, changes, created_at, user_id
            FROM note_audit_logs
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

fn prefixed_columns(alias: &str) -> String {
    NOTE_COLUMNS
        .split(", ")
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_columns() {
        let cols = prefixed_columns("n");
        assert!(cols.starts_with("n.id, n.title, n.content"));
        assert!(cols.ends_with("n.updated_at"));
        assert_eq!(cols.matches("n.").count(), NOTE_COLUMNS.split(", ").count());
    }
}
