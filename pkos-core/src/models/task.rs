use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TASK_PROCESS_NOTE: &str = "process_note";
pub const TASK_UPDATE_EMBEDDING: &str = "update_embedding";

/// Queue envelope: `{"type": "...", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Task {
    ProcessNote { note_id: Uuid },
    UpdateEmbedding { note_id: Uuid },
}

impl Task {
    pub fn kind(&self) -> &'static str {
        match self {
            Task::ProcessNote { .. } => TASK_PROCESS_NOTE,
            Task::UpdateEmbedding { .. } => TASK_UPDATE_EMBEDDING,
        }
    }

    pub fn note_id(&self) -> Uuid {
        match self {
            Task::ProcessNote { note_id } | Task::UpdateEmbedding { note_id } => *note_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let id = Uuid::new_v4();
        let value = serde_json::to_value(Task::ProcessNote { note_id: id }).unwrap();
        assert_eq!(value["type"], "process_note");
        assert_eq!(value["payload"]["note_id"], id.to_string());
    }

    #[test]
    fn test_parses_update_embedding() {
        let id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"update_embedding","payload":{{"note_id":"{id}"}}}}"#);
        let task: Task = serde_json::from_str(&raw).unwrap();
        assert_eq!(task, Task::UpdateEmbedding { note_id: id });
        assert_eq!(task.kind(), TASK_UPDATE_EMBEDDING);
        assert_eq!(task.note_id(), id);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let raw = r#"{"type":"reindex_everything","payload":{}}"#;
        assert!(serde_json::from_str::<Task>(raw).is_err());
    }

    #[test]
    fn test_missing_note_id_is_rejected() {
        let raw = r#"{"type":"process_note","payload":{}}"#;
        assert!(serde_json::from_str::<Task>(raw).is_err());
    }
}
