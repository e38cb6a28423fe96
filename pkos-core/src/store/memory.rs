use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::NoteStore;
use crate::error::{PkosError, Result};
use crate::models::{AuditEntry, NewAuditEntry, NewNote, Note, NoteFilter, NoteUpdate, ScoredNote};

#[derive(Debug)]
struct StoredNote {
    note: Note,
    embedding: Option<Vec<f32>>,
    seq: u64,
}

#[derive(Debug)]
struct StoredLink {
    source: Uuid,
    target: Uuid,
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    notes: HashMap<Uuid, StoredNote>,
    links: Vec<StoredLink>,
    audit: Vec<(u64, AuditEntry)>,
    next_seq: u64,
}

impl Inner {
    fn seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn linked(&self, id: Uuid, outgoing: bool) -> Vec<Note> {
        let mut edges: Vec<&StoredLink> = self
            .links
            .iter()
            .filter(|l| if outgoing { l.source == id } else { l.target == id })
            .collect();
        edges.sort_by_key(|l| l.seq);
        edges
            .into_iter()
            .filter_map(|l| {
                let other = if outgoing { l.target } else { l.source };
                self.notes.get(&other).map(|s| s.note.clone())
            })
            .collect()
    }
}

/// `NoteStore` held in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryNoteStore {
    inner: RwLock<Inner>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| PkosError::Other("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| PkosError::Other("memory store lock poisoned".to_string()))
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn insert(&self, new: NewNote) -> Result<Note> {
        let mut inner = self.write()?;
        let now = Utc::now();
        let note = Note {
            id: Uuid::new_v4(),
            title: new.title,
            content: new.content,
            summary: None,
            tags: new.tags,
            is_archived: false,
            is_pinned: false,
            metadata: new.metadata.unwrap_or_else(|| serde_json::json!({})),
            created_at: now,
            updated_at: now,
        };
        let seq = inner.seq();
        inner.notes.insert(
            note.id,
            StoredNote {
                note: note.clone(),
                embedding: None,
                seq,
            },
        );
        Ok(note)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Note>> {
        Ok(self.read()?.notes.get(&id).map(|s| s.note.clone()))
    }

    async fn update(&self, id: Uuid, update: &NoteUpdate) -> Result<Option<Note>> {
        let mut inner = self.write()?;
        let Some(stored) = inner.notes.get_mut(&id) else {
            return Ok(None);
        };
        update.apply_to(&mut stored.note);
        stored.note.updated_at = Utc::now();
        Ok(Some(stored.note.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.write()?;
        if inner.notes.remove(&id).is_none() {
            return Ok(false);
        }
        inner.links.retain(|l| l.source != id && l.target != id);
        inner.audit.retain(|(_, e)| e.note_id != id);
        Ok(true)
    }

    async fn list(&self, filter: &NoteFilter) -> Result<Vec<Note>> {
        let inner = self.read()?;
        let mut hits: Vec<&StoredNote> = inner
            .notes
            .values()
            .filter(|s| filter.matches(&s.note))
            .collect();
        hits.sort_by(|a, b| {
            b.note
                .is_pinned
                .cmp(&a.note.is_pinned)
                .then(b.note.created_at.cmp(&a.note.created_at))
                .then(b.seq.cmp(&a.seq))
        });
        Ok(hits.into_iter().map(|s| s.note.clone()).collect())
    }

    async fn set_embedding(&self, id: Uuid, embedding: Vec<f32>) -> Result<bool> {
        let mut inner = self.write()?;
        match inner.notes.get_mut(&id) {
            Some(stored) => {
                stored.embedding = Some(embedding);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn nearest(&self, query: &[f32], limit: i64) -> Result<Vec<ScoredNote>> {
        let inner = self.read()?;
        let mut scored: Vec<ScoredNote> = inner
            .notes
            .values()
            .filter_map(|s| {
                let embedding = s.embedding.as_ref()?;
                // pgvector rejects mismatched dimensions; here they are simply skipped
                if embedding.len() != query.len() {
                    return None;
                }
                Some(ScoredNote {
                    id: s.note.id,
                    distance: l2_distance(embedding, query),
                })
            })
            .collect();
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(usize::try_from(limit.max(0)).unwrap_or(0));
        Ok(scored)
    }

    async fn add_link(&self, source: Uuid, target: Uuid) -> Result<bool> {
        let mut inner = self.write()?;
        if !inner.notes.contains_key(&source) || !inner.notes.contains_key(&target) {
            return Err(PkosError::Other(format!(
                "link endpoint missing: {source} -> {target}"
            )));
        }
        if inner
            .links
            .iter()
            .any(|l| l.source == source && l.target == target)
        {
            return Ok(false);
        }
        let seq = inner.seq();
        inner.links.push(StoredLink { source, target, seq });
        Ok(true)
    }

    async fn remove_link(&self, source: Uuid, target: Uuid) -> Result<bool> {
        let mut inner = self.write()?;
        let before = inner.links.len();
        inner
            .links
            .retain(|l| !(l.source == source && l.target == target));
        Ok(inner.links.len() != before)
    }

    async fn outgoing_links(&self, id: Uuid) -> Result<Vec<Note>> {
        Ok(self.read()?.linked(id, true))
    }

    async fn incoming_links(&self, id: Uuid) -> Result<Vec<Note>> {
        Ok(self.read()?.linked(id, false))
    }

    async fn append_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry> {
        let mut inner = self.write()?;
        if !inner.notes.contains_key(&entry.note_id) {
            return Err(PkosError::Other(format!(
                "audit for unknown note {}",
                entry.note_id
            )));
        }
        let row = AuditEntry {
            id: Uuid::new_v4(),
            note_id: entry.note_id,
            action: entry.action,
            changes: entry.changes,
            created_at: Utc::now(),
            user_id: entry.user_id,
        };
        let seq = inner.seq();
        inner.audit.push((seq, row.clone()));
        Ok(row)
    }

    async fn audit_history(&self, note_id: Uuid, limit: i64) -> Result<Vec<AuditEntry>> {
        let inner = self.read()?;
        let limit = usize::try_from(limit.max(0)).unwrap_or(0);
        // appended in order, so reverse insertion order is newest first
        Ok(inner
            .audit
            .iter()
            .rev()
            .filter(|(_, e)| e.note_id == note_id)
            .take(limit)
            .map(|(_, e)| e.clone())
            .collect())
    }

    async fn recent_audit(&self, limit: i64) -> Result<Vec<AuditEntry>> {
        let inner = self.read()?;
        let limit = usize::try_from(limit.max(0)).unwrap_or(0);
        Ok(inner
            .audit
            .iter()
            .rev()
            .take(limit)
            .map(|(_, e)| e.clone())
            .collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
