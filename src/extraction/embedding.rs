//! Chunk embeddings for similarity search.
//!
//! Embeddings are optional. A failure to embed is logged and leaves the
//! chunk without an embedding; it never fails extraction.

use std::{thread, time::Duration};

use reqwest::{
    blocking::Client,
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    StatusCode,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{Chunk, EmbeddingConfig};

/// Errors from an embedder.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// The API key environment variable is unset or empty.
    #[error("environment variable {0} is not set")]
    MissingApiKey(String),

    /// The configuration cannot be used.
    #[error("invalid embedding configuration: {0}")]
    InvalidConfig(String),

    /// The request failed after all retries.
    #[error("embedding request to {endpoint} failed: {reason}")]
    Request {
        /// The endpoint called.
        endpoint: String,
        /// Why it failed.
        reason: String,
    },
}

/// Something that maps texts to vectors.
pub trait Embedder: Send + Sync {
    /// Name of the embedder, for logs.
    fn name(&self) -> &str;

    /// Maximum number of texts per call.
    fn batch_size(&self) -> usize;

    /// Embed a batch of texts, returning one vector per text in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be embedded.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

impl std::fmt::Debug for dyn Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Build the embedder described by the configuration, if any.
///
/// # Errors
///
/// Returns an error if a remote embedder is configured but cannot be built,
/// for example because its API key is missing.
pub fn from_config(config: &EmbeddingConfig) -> Result<Option<Box<dyn Embedder>>, EmbedError> {
    match config {
        EmbeddingConfig::None => Ok(None),
        EmbeddingConfig::Hashing { dimensions } => {
            Ok(Some(Box::new(HashingEmbedder::new(*dimensions)?)))
        }
        EmbeddingConfig::OpenAi {
            base_url,
            model,
            api_key_env,
            dimensions,
            batch_size,
            timeout_ms,
        } => {
            let api_key = std::env::var(api_key_env)
                .ok()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| EmbedError::MissingApiKey(api_key_env.clone()))?;
            Ok(Some(Box::new(OpenAiEmbedder::new(
                &api_key,
                base_url,
                model,
                *dimensions,
                Duration::from_millis(*timeout_ms),
                *batch_size,
            )?)))
        }
    }
}

/// Embed every chunk, batch by batch.
///
/// A failed batch is logged and its chunks keep no embedding. Returns the
/// number of chunks that received one.
pub fn embed_chunks(embedder: &dyn Embedder, chunks: &mut [Chunk]) -> usize {
    let mut embedded = 0;
    for batch in chunks.chunks_mut(embedder.batch_size().max(1)) {
        let texts: Vec<&str> = batch.iter().map(Chunk::cleaned_text).collect();
        match embedder.embed(&texts) {
            Ok(vectors) if vectors.len() == batch.len() => {
                for (chunk, vector) in batch.iter_mut().zip(vectors) {
                    chunk.set_embedding(Some(vector));
                }
                embedded += batch.len();
            }
            Ok(vectors) => {
                tracing::warn!(
                    "{} returned {} embeddings for {} chunks; skipping batch",
                    embedder.name(),
                    vectors.len(),
                    batch.len()
                );
                clear(batch);
            }
            Err(e) => {
                let first = batch.first().map(Chunk::chunk_ref);
                tracing::warn!(
                    "failed to embed batch starting at {}: {e}",
                    first.map_or_else(String::new, |r| r.to_string())
                );
                clear(batch);
            }
        }
    }
    embedded
}

fn clear(batch: &mut [Chunk]) {
    for chunk in batch {
        chunk.set_embedding(None);
    }
}

/// Cosine similarity of two vectors; zero if either is all zeros or the
/// lengths differ.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Deterministic local embeddings by feature hashing.
///
/// Lower-cased word unigrams and bigrams are hashed with SHA-256 into a
/// fixed number of signed buckets, and the result is L2-normalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    /// Creates an embedder producing vectors of the given length.
    ///
    /// # Errors
    ///
    /// Returns an error if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self, EmbedError> {
        if dimensions == 0 {
            return Err(EmbedError::InvalidConfig(
                "hashing dimensions must be at least 1".to_string(),
            ));
        }
        Ok(Self { dimensions })
    }

    /// Embed a single text.
    #[must_use]
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let mut vector = vec![0.0_f32; self.dimensions];
        let bigrams = words.windows(2).map(|pair| format!("{} {}", pair[0], pair[1]));
        for feature in words.iter().map(|w| (*w).to_string()).chain(bigrams) {
            let hash = Sha256::digest(feature.as_bytes());
            let mut bytes = [0_u8; 8];
            bytes.copy_from_slice(&hash[..8]);
            let value = u64::from_le_bytes(bytes);
            let bucket = usize::try_from(value % self.dimensions as u64).unwrap_or_default();
            let sign = if hash[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn batch_size(&self) -> usize {
        256
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

const MAX_RETRIES: usize = 3;

/// Blocking embeddings client for OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    batch_size: usize,
}

impl OpenAiEmbedder {
    /// Builds a new embeddings client.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or model is blank, the batch size is
    /// zero, or the HTTP client cannot be built.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        dimensions: Option<usize>,
        timeout: Duration,
        batch_size: usize,
    ) -> Result<Self, EmbedError> {
        if model.trim().is_empty() {
            return Err(EmbedError::InvalidConfig("missing model name".to_string()));
        }
        if batch_size == 0 {
            return Err(EmbedError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }

        let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| EmbedError::InvalidConfig("invalid API key".to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| EmbedError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            model: model.to_string(),
            dimensions,
            batch_size,
        })
    }

    fn failed(&self, reason: impl Into<String>) -> EmbedError {
        EmbedError::Request {
            endpoint: self.endpoint.clone(),
            reason: reason.into(),
        }
    }

    fn retry_backoff(attempt: usize) -> Duration {
        let capped = u32::try_from(attempt.min(5)).unwrap_or(5);
        Duration::from_millis(500 * (1 << capped))
    }
}

impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.len() > self.batch_size {
            return Err(self.failed(format!(
                "batch of {} exceeds configured max {}",
                texts.len(),
                self.batch_size
            )));
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimensions,
        };

        let mut attempt = 0;
        loop {
            let retryable = match self.client.post(&self.endpoint).json(&request).send() {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let mut parsed: EmbeddingResponse = response
                            .json()
                            .map_err(|e| self.failed(format!("invalid response: {e}")))?;
                        parsed.data.sort_by_key(|entry| entry.index);
                        if parsed.data.len() != texts.len() {
                            return Err(self.failed(format!(
                                "{} embeddings returned for {} inputs",
                                parsed.data.len(),
                                texts.len()
                            )));
                        }
                        return Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect());
                    }

                    let body = response
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    let retry = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    (retry, format!("{status}: {body}"))
                }
                Err(e) => (e.is_timeout() || e.is_connect() || e.is_request(), e.to_string()),
            };

            let (retry, reason) = retryable;
            if retry && attempt + 1 < MAX_RETRIES {
                attempt += 1;
                tracing::debug!(
                    "embedding request failed ({reason}); retry {attempt} of {}",
                    MAX_RETRIES - 1
                );
                thread::sleep(Self::retry_backoff(attempt));
                continue;
            }
            return Err(self.failed(reason));
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChunkKind, DocumentId, Provenance};

    #[test]
    fn hashing_is_deterministic_and_normalised() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let a = embedder.embed_one("The contractor shall maintain 99.9% uptime.");
        let b = embedder.embed_one("The contractor shall maintain 99.9% uptime.");

        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn similar_texts_are_closer_than_unrelated_ones() {
        let embedder = HashingEmbedder::new(384).unwrap();
        let uptime = embedder.embed_one("The contractor shall maintain 99.9% uptime for systems.");
        let similar = embedder.embed_one("The contractor shall maintain 99.5% uptime for servers.");
        let unrelated = embedder.embed_one("Offerors must limit proposals to thirty pages.");

        assert!(cosine_similarity(&uptime, &similar) > cosine_similarity(&uptime, &unrelated));
    }

    #[test]
    fn empty_text_embeds_to_zeros() {
        let embedder = HashingEmbedder::new(8).unwrap();
        assert_eq!(embedder.embed_one("  "), vec![0.0; 8]);
    }

    #[test]
    fn zero_dimensions_is_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }

    struct Broken;

    impl Embedder for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn batch_size(&self) -> usize {
            2
        }

        fn embed(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Err(EmbedError::Request {
                endpoint: "http://test".to_string(),
                reason: "down".to_string(),
            })
        }
    }

    fn chunks(n: u32) -> Vec<Chunk> {
        (0..n)
            .map(|index| {
                Chunk::new(
                    DocumentId::new("doc".to_string()).unwrap(),
                    index,
                    ChunkKind::Paragraph,
                    Provenance::default(),
                    format!("Chunk number {index} of the statement of work."),
                )
            })
            .collect()
    }

    #[test]
    fn every_chunk_is_embedded_across_batches() {
        let mut chunks = chunks(5);
        let embedded = embed_chunks(&HashingEmbedder::new(16).unwrap(), &mut chunks);
        assert_eq!(embedded, 5);
        assert!(chunks.iter().all(|c| c.embedding().is_some_and(|e| e.len() == 16)));
    }

    #[test]
    fn failure_leaves_chunks_without_embeddings() {
        let mut chunks = chunks(3);
        chunks[0].set_embedding(Some(vec![1.0]));

        let embedded = embed_chunks(&Broken, &mut chunks);

        assert_eq!(embedded, 0);
        assert!(chunks.iter().all(|c| c.embedding().is_none()));
    }

    #[test]
    fn missing_api_key_is_reported() {
        let config = EmbeddingConfig::OpenAi {
            base_url: "http://localhost".to_string(),
            model: "m".to_string(),
            api_key_env: "SHALL_TEST_EMBED_KEY_THAT_IS_NEVER_SET".to_string(),
            dimensions: None,
            batch_size: 8,
            timeout_ms: 100,
        };
        assert!(matches!(
            from_config(&config),
            Err(EmbedError::MissingApiKey(_))
        ));
    }

    #[test]
    fn none_config_builds_nothing() {
        assert!(from_config(&EmbeddingConfig::None).unwrap().is_none());
    }
}
