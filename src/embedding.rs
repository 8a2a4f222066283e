//! Embedding provider abstraction and the OpenAI implementation.
//!
//! The [`Embedder`] trait is the seam between the pipelines and the external
//! provider; the ingestion and query paths depend on it, and tests inject
//! stubs. [`OpenAiEmbedder`] calls the `POST /v1/embeddings` endpoint with
//! retry and exponential backoff.
//!
//! Every response is validated against the expected dimensionality — a
//! malformed vector is an [`EmbedError::InvalidResponse`], never silently
//! accepted. Input longer than the provider ceiling is truncated rather
//! than rejected: oversized text is already ruled out upstream by the
//! chunk-size contract, so the cap is a safety net.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::config::EmbeddingConfig;

/// Failure modes of an embedding call.
#[derive(Debug)]
pub enum EmbedError {
    /// Empty or whitespace-only input.
    InvalidInput(String),
    /// The provider returned a vector that is empty or of the wrong
    /// dimensionality, or a body we could not interpret.
    InvalidResponse(String),
    /// Transport or provider-side failure after retries were exhausted.
    Provider(String),
}

impl std::fmt::Display for EmbedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbedError::InvalidInput(m) => write!(f, "invalid embedding input: {}", m),
            EmbedError::InvalidResponse(m) => write!(f, "invalid embedding response: {}", m),
            EmbedError::Provider(m) => write!(f, "embedding provider error: {}", m),
        }
    }
}

impl std::error::Error for EmbedError {}

/// Produces fixed-dimension vectors for text.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
    /// The dimensionality every returned vector must have.
    fn dims(&self) -> usize;
}

/// Resolve the provider API key from the environment.
pub(crate) fn resolve_api_key() -> Result<String, String> {
    std::env::var("OPENAI_API_KEY").map_err(|_| "OPENAI_API_KEY not set".to_string())
}

/// Lazily constructed provider handle: HTTP client plus resolved API key.
///
/// Built once on first use and reused for the process lifetime; rebuilding
/// it per call would be equally correct, just slower.
struct ProviderHandle {
    http: reqwest::Client,
    api_key: String,
}

/// Embedding provider backed by the OpenAI embeddings API.
pub struct OpenAiEmbedder {
    config: EmbeddingConfig,
    dims: usize,
    handle: OnceCell<ProviderHandle>,
}

impl OpenAiEmbedder {
    pub fn new(config: EmbeddingConfig, dims: usize) -> Self {
        Self {
            config,
            dims,
            handle: OnceCell::new(),
        }
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com")
            .trim_end_matches('/');
        format!("{}/v1/embeddings", base)
    }

    async fn handle(&self) -> Result<&ProviderHandle, EmbedError> {
        self.handle
            .get_or_try_init(|| async {
                let api_key = resolve_api_key().map_err(EmbedError::Provider)?;
                let http = reqwest::Client::builder()
                    .timeout(Duration::from_secs(self.config.timeout_secs))
                    .build()
                    .map_err(|e| EmbedError::Provider(e.to_string()))?;
                Ok(ProviderHandle { http, api_key })
            })
            .await
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if text.trim().is_empty() {
            return Err(EmbedError::InvalidInput(
                "cannot embed empty text".to_string(),
            ));
        }

        let input = truncate_chars(text, self.config.max_input_chars);
        let handle = self.handle().await?;
        let url = self.endpoint();

        let body = serde_json::json!({
            "model": self.config.model,
            "input": input,
        });

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = handle
                .http
                .post(&url)
                .bearer_auth(&handle.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| EmbedError::InvalidResponse(e.to_string()))?;
                        let vector = parse_embedding_response(&json)?;
                        validate_dims(&vector, self.dims)?;
                        return Ok(vector);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(EmbedError::Provider(format!(
                            "provider returned {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(EmbedError::Provider(format!(
                        "provider returned {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(EmbedError::Provider(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| EmbedError::Provider("embedding failed after retries".to_string())))
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

/// Extract the first embedding vector from a `/v1/embeddings` response body.
pub fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<f32>, EmbedError> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            EmbedError::InvalidResponse("missing data[0].embedding in response".to_string())
        })?;

    Ok(embedding
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

/// Reject empty vectors and dimensionality mismatches.
pub fn validate_dims(vector: &[f32], dims: usize) -> Result<(), EmbedError> {
    if vector.is_empty() || vector.len() != dims {
        return Err(EmbedError::InvalidResponse(format!(
            "expected {} dimensions, got {}",
            dims,
            vector.len()
        )));
    }
    Ok(())
}

/// Truncate to at most `max_chars` characters, never splitting a char.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_input_is_invalid() {
        let embedder = OpenAiEmbedder::new(EmbeddingConfig::default(), 1536);
        let err = embedder.embed("").await.unwrap_err();
        assert!(matches!(err, EmbedError::InvalidInput(_)));

        let err = embedder.embed("   \n\t ").await.unwrap_err();
        assert!(matches!(err, EmbedError::InvalidInput(_)));
    }

    #[test]
    fn dimension_mismatch_is_invalid_response() {
        let err = validate_dims(&[0.1, 0.2], 1536).unwrap_err();
        assert!(matches!(err, EmbedError::InvalidResponse(_)));

        let err = validate_dims(&[], 1536).unwrap_err();
        assert!(matches!(err, EmbedError::InvalidResponse(_)));

        assert!(validate_dims(&vec![0.5; 1536], 1536).is_ok());
    }

    #[test]
    fn parse_extracts_first_vector() {
        let json = serde_json::json!({
            "data": [{"embedding": [0.25, -1.5, 3.0]}],
            "model": "text-embedding-3-small"
        });
        assert_eq!(parse_embedding_response(&json).unwrap(), vec![0.25, -1.5, 3.0]);
    }

    #[test]
    fn parse_rejects_missing_data() {
        let json = serde_json::json!({"error": {"message": "nope"}});
        assert!(matches!(
            parse_embedding_response(&json),
            Err(EmbedError::InvalidResponse(_))
        ));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        // Two-byte chars: counting chars, not bytes.
        assert_eq!(truncate_chars("ééééé", 3), "ééé");
    }

    #[test]
    fn cosine_identical_and_orthogonal() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);

        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }
}
