//! Text embeddings.
//!
//! Texts longer than the model's input window are split by tokens, each
//! piece embedded, and the pieces averaged (weighted by length) and
//! L2-normalised.

use std::future::Future;
use std::sync::Arc;

use prism_config::LlmConfig;
use serde::Deserialize;
use serde_json::json;

use crate::error::LlmError;
use crate::http::{authorize, build_client, check_response, endpoint_url};
use crate::retry::{RetryConfig, with_retry};
use crate::tokens::TokenEncoder;

/// Input window of the OpenAI embedding models.
pub const MAX_EMBEDDING_TOKENS: usize = 8191;

pub trait TextEmbedder: Send + Sync {
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    http: reqwest::Client,
    config: LlmConfig,
    retry: RetryConfig,
    encoder: Arc<TokenEncoder>,
}

impl EmbeddingClient {
    /// # Errors
    ///
    /// Returns [`LlmError::NotConfigured`] when the key (or Azure base) is
    /// missing, [`LlmError::Http`] if the HTTP client cannot be built.
    pub fn new(
        config: LlmConfig,
        retry: RetryConfig,
        encoder: Arc<TokenEncoder>,
    ) -> Result<Self, LlmError> {
        if !config.is_configured() {
            return Err(LlmError::NotConfigured("embedding"));
        }
        Ok(Self {
            http: build_client()?,
            config,
            retry,
            encoder,
        })
    }

    async fn embed_batch_once(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let body = json!({ "model": self.config.model, "input": inputs });
        let url = endpoint_url(&self.config, "embeddings");
        let resp = authorize(self.http.post(&url), &self.config)
            .json(&body)
            .send()
            .await?;
        let resp = check_response(resp).await?;
        let mut parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("embedding body: {e}")))?;
        if parsed.data.len() != inputs.len() {
            return Err(LlmError::Parse(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    /// Embed several texts in one request, with retry.
    ///
    /// # Errors
    ///
    /// Returns the last [`LlmError`] once retries are exhausted.
    pub async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        with_retry(&self.retry, "embedding", || self.embed_batch_once(inputs)).await
    }
}

impl TextEmbedder for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let pieces = self.encoder.chunk(text, MAX_EMBEDDING_TOKENS);
        let vectors = self.embed_batch(&pieces).await?;
        let weights: Vec<usize> = pieces.iter().map(|p| p.len().max(1)).collect();
        Ok(weighted_mean_normalized(&vectors, &weights))
    }
}

/// Length-weighted average of `vectors`, scaled to unit length. A single
/// vector is returned as-is.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn weighted_mean_normalized(vectors: &[Vec<f32>], weights: &[usize]) -> Vec<f32> {
    match vectors {
        [] => Vec::new(),
        [only] => only.clone(),
        _ => {
            let dim = vectors[0].len();
            let total: f32 = weights.iter().map(|w| *w as f32).sum();
            let mut mean = vec![0.0f32; dim];
            for (v, w) in vectors.iter().zip(weights) {
                let share = *w as f32 / total;
                for (m, x) in mean.iter_mut().zip(v) {
                    *m += x * share;
                }
            }
            let norm = mean.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for m in &mut mean {
                    *m /= norm;
                }
            }
            mean
        }
    }
}
