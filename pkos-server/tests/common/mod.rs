//! Shared fixtures: in-memory state with scripted embedding and language-model backends.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pkos_core::{
    EmbeddingBackend, EmbeddingError, LanguageModel, LlmError, MemoryNoteStore, MemoryTaskQueue,
    PkosConfig,
};
use pkos_server::AppState;

pub const DIMS: usize = 3;

/// Returns a fixed vector per exact text; unknown text maps to the origin.
#[derive(Default)]
pub struct StubEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fail: bool,
}

impl StubEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            vectors: HashMap::new(),
            fail: true,
        }
    }

    pub fn with(mut self, text: &str, vector: [f32; DIMS]) -> Self {
        self.vectors.insert(text.to_string(), vector.to_vec());
        self
    }
}

#[async_trait]
impl EmbeddingBackend for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        if self.fail {
            return Err(EmbeddingError::OnnxInference(
                "stub embedder unavailable".to_string(),
            ));
        }
        Ok(Some(
            self.vectors
                .get(text)
                .cloned()
                .unwrap_or_else(|| vec![0.0; DIMS]),
        ))
    }

    fn dimensions(&self) -> usize {
        DIMS
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Answers summary prompts and tag prompts with canned replies. `None` fails the call.
pub struct StubLlm {
    pub summary: Option<String>,
    pub tags: Option<String>,
    pub calls: AtomicUsize,
}

impl StubLlm {
    pub fn new(summary: Option<&str>, tags: Option<&str>) -> Self {
        Self {
            summary: summary.map(str::to_string),
            tags: tags.map(str::to_string),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LanguageModel for StubLlm {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = if prompt.starts_with("Please summarize") {
            &self.summary
        } else {
            &self.tags
        };
        reply.clone().ok_or(LlmError::Api {
            code: 500,
            message: "stub failure".to_string(),
        })
    }

    fn name(&self) -> &str {
        "stub-llm"
    }
}

pub struct Harness {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryNoteStore>,
    pub queue: Arc<MemoryTaskQueue>,
}

pub fn harness(embedder: Option<StubEmbedder>, llm: Option<StubLlm>) -> Harness {
    harness_with_config(embedder, llm, PkosConfig::default())
}

pub fn harness_with_config(
    embedder: Option<StubEmbedder>,
    llm: Option<StubLlm>,
    config: PkosConfig,
) -> Harness {
    let store = Arc::new(MemoryNoteStore::new());
    let queue = Arc::new(MemoryTaskQueue::new());

    let mut state = AppState::new(store.clone(), queue.clone(), config);
    if let Some(embedder) = embedder {
        state = state.with_embedder(Arc::new(embedder));
    }
    if let Some(llm) = llm {
        state = state.with_llm(Arc::new(llm));
    }

    Harness {
        state: Arc::new(state),
        store,
        queue,
    }
}
