use std::sync::Arc;

use pkos_core::{EmbeddingBackend, LanguageModel, NoteStore, PkosConfig, TaskQueue};

/// Handles shared by the HTTP handlers and the worker.
///
/// The embedder and language model are optional: without them the server
/// still serves CRUD, and searches or enrichment degrade to empty results.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn NoteStore>,
    pub queue: Arc<dyn TaskQueue>,
    pub embedder: Option<Arc<dyn EmbeddingBackend>>,
    pub llm: Option<Arc<dyn LanguageModel>>,
    pub config: PkosConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn NoteStore>, queue: Arc<dyn TaskQueue>, config: PkosConfig) -> Self {
        Self {
            store,
            queue,
            embedder: None,
            llm: None,
            config,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingBackend>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }
}
