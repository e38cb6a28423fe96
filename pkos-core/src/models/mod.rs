pub mod audit;
pub mod note;
pub mod task;

pub use audit::{AuditEntry, NewAuditEntry};
pub use note::{NewNote, Note, NoteFilter, NoteUpdate, ScoredNote};
pub use task::Task;
