use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub note_id: Uuid,
    pub action: String,
    pub changes: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub note_id: Uuid,
    pub action: String,
    pub changes: serde_json::Value,
    pub user_id: Option<Uuid>,
}
