pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod llm;
pub mod models;
pub mod onnx_embedder;
pub mod queue;
pub mod store;

pub use config::PkosConfig;
pub use embeddings::{EmbeddingBackend, EmbeddingError, OnnxConfig, EMBEDDING_DIMENSIONS};
pub use error::{PkosError, Result};
pub use llm::{GeminiChatClient, LanguageModel, LlmConfig, LlmError};
pub use models::{AuditEntry, NewAuditEntry, NewNote, Note, NoteFilter, NoteUpdate, ScoredNote, Task};
pub use onnx_embedder::OnnxEmbeddingClient;
pub use queue::{MemoryTaskQueue, QueueError, RedisTaskQueue, TaskQueue};
pub use store::{MemoryNoteStore, NoteStore, PgNoteStore};
