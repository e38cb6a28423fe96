use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A note as stored and returned over the API. The embedding lives in its own
/// column and is never loaded into this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Uuid,
    pub title: Option<String>,
    pub content: String,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub is_archived: bool,
    pub is_pinned: bool,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewNote {
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl NewNote {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tags: Vec::new(),
            title: None,
            metadata: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Partial update. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl NoteUpdate {
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Names of the fields this update writes, in declaration order.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.content.is_some() {
            fields.push("content");
        }
        if self.summary.is_some() {
            fields.push("summary");
        }
        if self.tags.is_some() {
            fields.push("tags");
        }
        if self.title.is_some() {
            fields.push("title");
        }
        if self.is_archived.is_some() {
            fields.push("isArchived");
        }
        if self.is_pinned.is_some() {
            fields.push("isPinned");
        }
        if self.metadata.is_some() {
            fields.push("metadata");
        }
        fields
    }

    /// Apply to an in-memory note. Does not touch `updated_at`.
    pub fn apply_to(&self, note: &mut Note) {
        if let Some(content) = &self.content {
            note.content = content.clone();
        }
        if let Some(summary) = &self.summary {
            note.summary = Some(summary.clone());
        }
        if let Some(tags) = &self.tags {
            note.tags = tags.clone();
        }
        if let Some(title) = &self.title {
            note.title = Some(title.clone());
        }
        if let Some(archived) = self.is_archived {
            note.is_archived = archived;
        }
        if let Some(pinned) = self.is_pinned {
            note.is_pinned = pinned;
        }
        if let Some(metadata) = &self.metadata {
            note.metadata = metadata.clone();
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoteFilter {
    pub include_archived: bool,
    pub tag: Option<String>,
}

impl NoteFilter {
    pub fn matches(&self, note: &Note) -> bool {
        if note.is_archived && !self.include_archived {
            return false;
        }
        match &self.tag {
            Some(tag) => note.tags.iter().any(|t| t == tag),
            None => true,
        }
    }
}

/// Nearest-neighbour hit: note id plus L2 distance to the query vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScoredNote {
    pub id: Uuid,
    pub distance: f64,
}
