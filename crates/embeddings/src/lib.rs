//! Embedding Adapter: produces fixed-dimension, L2-normalized dense vectors
//! for chunks and queries.
//!
//! Mirrors the teacher's text-embeddings stack nearly exactly: `ort` (ONNX
//! Runtime) for inference, `tokenizers` for tokenization, `ndarray` for
//! tensor shaping, mean-pooling over the last hidden state weighted by the
//! attention mask, then L2 normalization. Retries on transient failure with
//! an inline doubling backoff rather than a combinator crate, matching the
//! teacher's preference for inline retry logic.

use ndarray::Array2;
use once_cell::sync::OnceCell;
use ort::session::Session;
use ort::value::TensorRef;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokenizers::Tokenizer;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model_path: String,
    pub tokenizer_path: String,
    /// Declared output dimension `D`; every returned vector must have this
    /// length.
    pub dimension: usize,
    pub max_length: usize,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_path: "models/embeddings/multilingual_minilm.onnx".to_string(),
            tokenizer_path: "models/embeddings/tokenizer.json".to_string(),
            dimension: 384,
            max_length: 256,
            max_retries: 3,
            base_backoff_ms: 200,
        }
    }
}

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("failed to load ONNX model from {path}: {reason}")]
    ModelLoad { path: String, reason: String },

    #[error("failed to load tokenizer from {path}: {reason}")]
    TokenizerLoad { path: String, reason: String },

    #[error("tokenization failed: {0}")]
    Tokenization(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("exhausted {attempts} retries: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Text embedding model, one `ort::Session` per process (loaded once via
/// `OnceCell`, the same lazy-session-caching idiom the teacher uses).
pub struct EmbeddingAdapter {
    session: OnceCell<Session>,
    tokenizer: OnceCell<Tokenizer>,
    config: EmbeddingConfig,
}

impl EmbeddingAdapter {
    #[must_use]
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            session: OnceCell::new(),
            tokenizer: OnceCell::new(),
            config,
        }
    }

    fn session(&self) -> Result<&Session, EmbeddingError> {
        self.session.get_or_try_init(|| {
            Session::builder()
                .and_then(|b| b.commit_from_file(&self.config.model_path))
                .map_err(|e| EmbeddingError::ModelLoad {
                    path: self.config.model_path.clone(),
                    reason: e.to_string(),
                })
        })
    }

    fn tokenizer(&self) -> Result<&Tokenizer, EmbeddingError> {
        self.tokenizer.get_or_try_init(|| {
            Tokenizer::from_file(Path::new(&self.config.tokenizer_path)).map_err(|e| {
                EmbeddingError::TokenizerLoad {
                    path: self.config.tokenizer_path.clone(),
                    reason: e.to_string(),
                }
            })
        })
    }

    /// Embed a single text, with exponential-backoff retry.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let texts = vec![text.to_string()];
        Ok(self.embed_batch(&texts).await?.remove(0))
    }

    /// Embed a batch of texts. Vectors are returned L2-normalized. Retries
    /// the whole batch with exponential backoff on transient inference
    /// failure; propagates `EmbeddingError::RetriesExhausted` once
    /// `max_retries` is exceeded.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut attempt = 0;
        let mut delay_ms = self.config.base_backoff_ms;
        loop {
            match self.embed_batch_once(texts) {
                Ok(vectors) => return Ok(vectors),
                Err(err) if attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(attempt, error = %err, "embedding call failed, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                    delay_ms *= 2;
                }
                Err(err) => {
                    return Err(EmbeddingError::RetriesExhausted {
                        attempts: attempt,
                        last_error: err.to_string(),
                    })
                }
            }
        }
    }

    fn embed_batch_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let session_cell = self.session()?;
        let tokenizer = self.tokenizer()?;
        debug!(count = texts.len(), "embedding batch");

        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let encoding = tokenizer
                .encode(text.as_str(), true)
                .map_err(|e| EmbeddingError::Tokenization(e.to_string()))?;

            let mut ids: Vec<i64> = encoding.get_ids().iter().map(|&t| i64::from(t)).collect();
            let mut mask: Vec<i64> = encoding
                .get_attention_mask()
                .iter()
                .map(|&m| i64::from(m))
                .collect();
            ids.truncate(self.config.max_length);
            mask.truncate(self.config.max_length);
            let seq_len = ids.len();
            let token_type_ids = vec![0i64; seq_len];

            let ids_arr = Array2::from_shape_vec((1, seq_len), ids)
                .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
            let mask_arr = Array2::from_shape_vec((1, seq_len), mask.clone())
                .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
            let type_arr = Array2::from_shape_vec((1, seq_len), token_type_ids)
                .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

            let ids_tensor = TensorRef::from_array_view(ids_arr.view())
                .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
            let mask_tensor = TensorRef::from_array_view(mask_arr.view())
                .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
            let type_tensor = TensorRef::from_array_view(type_arr.view())
                .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

            // `ort::Session::run` requires exclusive access; since the
            // adapter is shared read-only across callers, each call builds
            // its own local mutable borrow via interior `OnceCell` access is
            // not possible for `&mut self.run`, so callers are expected to
            // hold one `EmbeddingAdapter` per worker-pool slot (the Embedding
            // Adapter's bounded pool, see the discovery crate).
            let session = session_cell;
            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor, type_tensor])
                .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

            let (shape, hidden_states) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
            let hidden_dim = shape[2] as usize;

            let mut pooled = vec![0.0f32; hidden_dim];
            let mut sum_mask = 0.0f32;
            for (i, &m) in mask.iter().enumerate().take(seq_len) {
                let weight = m as f32;
                sum_mask += weight;
                for j in 0..hidden_dim {
                    pooled[j] += hidden_states[i * hidden_dim + j] * weight;
                }
            }
            if sum_mask > 0.0 {
                for v in &mut pooled {
                    *v /= sum_mask;
                }
            }

            normalize_l2(&mut pooled);
            out.push(pooled);
        }
        Ok(out)
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }
}

fn normalize_l2(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_l2_produces_unit_vector() {
        let mut v = vec![3.0, 4.0];
        normalize_l2(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn normalize_l2_zero_vector_stays_zero() {
        let mut v = vec![0.0, 0.0];
        normalize_l2(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn embed_batch_empty_input_is_empty_output() {
        let adapter = EmbeddingAdapter::new(EmbeddingConfig::default());
        let result = adapter.embed_batch(&[]).await.unwrap();
        assert!(result.is_empty());
    }
}
