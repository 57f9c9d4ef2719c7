//! Text embedding collaborators.
//!
//! `HttpEmbedder` calls a remote sentence-embedding service; `HashingEmbedder`
//! is a deterministic local feature-hashing model for offline use and tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::{EnforcementError, Upstream};

const CONNECT_TIMEOUT_MS: u64 = 500;
const REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Error)]
pub enum EmbedderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("embedder returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode embedding response: {0}")]
    Decode(String),

    #[error("embedding has {actual} dimensions, expected {expected}")]
    Dimension { expected: usize, actual: usize },

    #[error("embedding contains non-finite values")]
    NonFinite,
}

impl From<EmbedderError> for EnforcementError {
    fn from(err: EmbedderError) -> Self {
        EnforcementError::UpstreamUnavailable {
            service: Upstream::Embedder,
            reason: err.to_string(),
        }
    }
}

/// Sentence embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    /// Length of every vector returned by `embed`.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;
}

// ================================================================================================
// HTTP
// ================================================================================================

#[derive(Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Remote embedder: POST `{"text": ...}` to `{endpoint}/embed`, answer
/// `{"embedding": [...]}`.
pub struct HttpEmbedder {
    endpoint: String,
    dimension: usize,
    http_client: Client,
}

impl HttpEmbedder {
    pub fn new(endpoint: &str, dimension: usize) -> Result<Self, EmbedderError> {
        Self::with_timeouts(
            endpoint,
            dimension,
            Duration::from_millis(CONNECT_TIMEOUT_MS),
            Duration::from_millis(REQUEST_TIMEOUT_MS),
        )
    }

    pub fn with_timeouts(
        endpoint: &str,
        dimension: usize,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, EmbedderError> {
        let http_client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| EmbedderError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            dimension,
            http_client,
        })
    }

    fn url(&self) -> String {
        format!("{}/embed", self.endpoint)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn name(&self) -> &str {
        "http"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let response = self
            .http_client
            .post(self.url())
            .json(&EmbedRequest { text })
            .send()
            .await
            .map_err(|e| EmbedderError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable>".to_string());
            return Err(EmbedderError::Status { status, body });
        }

        let payload: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbedderError::Decode(e.to_string()))?;

        if payload.embedding.len() != self.dimension {
            return Err(EmbedderError::Dimension {
                expected: self.dimension,
                actual: payload.embedding.len(),
            });
        }

        Ok(payload.embedding)
    }
}

// ================================================================================================
// FEATURE HASHING
// ================================================================================================

/// Deterministic bag-of-tokens embedder.
///
/// Every unigram and adjacent-token bigram is hashed with SHA-256 into a
/// signed bucket; the bucket vector is L2-normalized. Texts sharing tokens
/// land close together, identical texts map to identical vectors.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMENSION: usize = 384;

    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|t| !t.is_empty())
            .collect();

        let mut vector = vec![0.0f32; self.dimension];
        for token in &tokens {
            self.accumulate(&mut vector, token);
        }
        for pair in tokens.windows(2) {
            self.accumulate(&mut vector, &format!("{} {}", pair[0], pair[1]));
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        Ok(self.embed_sync(text))
    }
}
