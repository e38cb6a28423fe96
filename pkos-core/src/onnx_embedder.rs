//! Local embedding backend: `all-MiniLM-L6-v2` through ONNX Runtime
//!
//! Tokenizes with `tokenizers`, runs the model with `ort`, then mean-pools the
//! last hidden state over the attention mask and L2-normalizes it, which is
//! what sentence-transformers does for this model. Output is 384-dimensional.

use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::embeddings::{check_dimensions, EmbeddingBackend, EmbeddingError, OnnxConfig};

const MODEL_FILE: &str = "all-MiniLM-L6-v2.onnx";
const TOKENIZER_FILE: &str = "all-MiniLM-L6-v2-tokenizer.json";

pub struct OnnxEmbeddingClient {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<tokenizers::Tokenizer>,
    dimensions: usize,
}

impl std::fmt::Debug for OnnxEmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingClient")
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl OnnxEmbeddingClient {
    /// Load the model and tokenizer named in `config`.
    ///
    /// Returns `EmbeddingError::ModelNotFound` if either file is missing.
    pub fn new(config: OnnxConfig) -> Result<Self, EmbeddingError> {
        for path in [&config.model_path, &config.tokenizer_path] {
            if !path.exists() {
                return Err(EmbeddingError::ModelNotFound {
                    path: path.display().to_string(),
                });
            }
        }

        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.commit_from_file(&config.model_path))
            .map_err(|e| EmbeddingError::OnnxInference(e.to_string()))?;

        let tokenizer = tokenizers::Tokenizer::from_file(&config.tokenizer_path)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        tracing::info!(
            model = %config.model_path.display(),
            dimensions = config.dimensions,
            "Loaded local embedding model"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for OnnxEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        // Inference is CPU-bound; keep it off the async workers.
        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let dimensions = self.dimensions;
        let text = text.to_string();

        let result = tokio::task::spawn_blocking(move || {
            let mut session_guard = session
                .lock()
                .map_err(|e| EmbeddingError::OnnxInference(format!("session lock poisoned: {e}")))?;
            embed_sync(&mut session_guard, &tokenizer, &text, dimensions)
        })
        .await
        .map_err(|e| EmbeddingError::OnnxInference(format!("spawn_blocking join error: {e}")))?;

        result.map(Some)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

fn embed_sync(
    session: &mut Session,
    tokenizer: &tokenizers::Tokenizer,
    text: &str,
    expected_dims: usize,
) -> Result<Vec<f32>, EmbeddingError> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

    let to_i64 = |xs: &[u32]| xs.iter().map(|&x| x as i64).collect::<Vec<i64>>();
    let input_ids = to_i64(encoding.get_ids());
    let attention_mask = to_i64(encoding.get_attention_mask());
    let token_type_ids = to_i64(encoding.get_type_ids());

    let shape = vec![1i64, input_ids.len() as i64];

    let input_ids_tensor = Tensor::from_array((shape.clone(), input_ids))
        .map_err(|e| EmbeddingError::OnnxInference(e.to_string()))?;
    let attention_mask_tensor = Tensor::from_array((shape.clone(), attention_mask.clone()))
        .map_err(|e| EmbeddingError::OnnxInference(e.to_string()))?;
    let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids))
        .map_err(|e| EmbeddingError::OnnxInference(e.to_string()))?;

    let inputs = ort::inputs! {
        "input_ids" => input_ids_tensor,
        "attention_mask" => attention_mask_tensor,
        "token_type_ids" => token_type_ids_tensor,
    };

    let outputs = session
        .run(inputs)
        .map_err(|e| EmbeddingError::OnnxInference(e.to_string()))?;

    // last_hidden_state: [1, seq_len, hidden_dim]
    let (out_shape, data) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| EmbeddingError::OnnxInference(e.to_string()))?;

    if out_shape.len() != 3 {
        return Err(EmbeddingError::OnnxInference(format!(
            "Expected 3D output, got {}D",
            out_shape.len()
        )));
    }
    let seq_len = out_shape[1] as usize;
    let hidden_dim = out_shape[2] as usize;

    let pooled = mean_pool(data, &attention_mask, seq_len, hidden_dim);
    check_dimensions(l2_normalize(pooled), expected_dims)
}

/// Attention-masked mean over the sequence axis of a flat `[seq_len, hidden_dim]` buffer.
fn mean_pool(data: &[f32], attention_mask: &[i64], seq_len: usize, hidden_dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden_dim];
    let mut mask_sum = 0.0f32;

    for tok_idx in 0..seq_len {
        let mask_val = attention_mask.get(tok_idx).copied().unwrap_or(0) as f32;
        if mask_val > 0.0 {
            mask_sum += mask_val;
            let offset = tok_idx * hidden_dim;
            for (dim, slot) in pooled.iter_mut().enumerate() {
                *slot += data[offset + dim] * mask_val;
            }
        }
    }

    if mask_sum > 0.0 {
        for v in &mut pooled {
            *v /= mask_sum;
        }
    }
    pooled
}

fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// `$XDG_DATA_HOME/pkos/models`, or `~/.local/share/pkos/models`.
pub fn default_model_dir() -> PathBuf {
    let data_home = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".local/share")
        });
    data_home.join("pkos/models")
}

/// Resolve `(model, tokenizer)` paths. An empty setting means the default
/// directory; otherwise the tokenizer sits next to the model as `<stem>-tokenizer.json`.
pub fn resolve_onnx_paths(onnx_model_path: &str) -> (PathBuf, PathBuf) {
    if onnx_model_path.is_empty() {
        let dir = default_model_dir();
        (dir.join(MODEL_FILE), dir.join(TOKENIZER_FILE))
    } else {
        let model = PathBuf::from(onnx_model_path);
        let stem = model
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let tokenizer = model.with_file_name(format!("{stem}-tokenizer.json"));
        (model, tokenizer)
    }
}
