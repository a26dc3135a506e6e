//! OpenAI-compatible embeddings client.

use super::traits::Embedder;
use crate::config::DEFAULT_EMBED_BATCH_SIZE;
use crate::error::EmbeddingError;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default OpenAI API base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default embedding model.
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-large";

/// Output dimension of the well-known OpenAI embedding models.
pub fn known_model_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-large" => Some(3072),
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        _ => None,
    }
}

/// Settings for [`OpenAiEmbedder`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key sent as a bearer token
    pub api_key: String,
    /// Base URL; `/embeddings` is appended
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Requested output dimension; required for models not in
    /// [`known_model_dimension`]
    pub dimensions: Option<usize>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Attempts per batch, including the first
    pub max_retries: usize,
    /// Inputs per request
    pub batch_size: usize,
    /// Backoff before the first retry; doubles per attempt
    pub retry_base_delay: Duration,
}

impl OpenAiConfig {
    /// Defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            dimensions: None,
            timeout: Duration::from_secs(60),
            max_retries: 5,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

/// Async embeddings client for OpenAI-compatible `/embeddings` endpoints.
///
/// Retries rate limits (429), server errors (5xx), and transport failures
/// with exponential backoff.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    embedding_dim: usize,
    max_retries: usize,
    batch_size: usize,
    retry_base_delay: Duration,
}

impl OpenAiEmbedder {
    /// Builds a new client.
    pub fn new(config: OpenAiConfig) -> Result<Self, EmbeddingError> {
        if config.api_key.trim().is_empty() {
            return Err(EmbeddingError::InvalidConfig(
                "missing OpenAI API key".to_string(),
            ));
        }
        if config.model.trim().is_empty() {
            return Err(EmbeddingError::InvalidConfig(
                "missing embedding model name".to_string(),
            ));
        }
        let embedding_dim = config
            .dimensions
            .or_else(|| known_model_dimension(&config.model))
            .ok_or_else(|| {
                EmbeddingError::InvalidConfig(format!(
                    "unknown dimension for model '{}'; set it explicitly",
                    config.model
                ))
            })?;

        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| EmbeddingError::InvalidConfig("invalid API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model,
            dimensions: config.dimensions,
            embedding_dim,
            max_retries: config.max_retries.max(1),
            batch_size: config.batch_size.max(1),
            retry_base_delay: config.retry_base_delay,
        })
    }

    /// Sends one batch and returns its vectors in input order.
    #[instrument(skip_all, fields(inputs = inputs.len()))]
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut attempt = 0usize;
        loop {
            let request = EmbeddingRequest {
                model: &self.model,
                input: inputs,
                dimensions: self.dimensions,
            };
            match self.client.post(&self.endpoint).json(&request).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let parsed: EmbeddingResponse = resp
                            .json()
                            .await
                            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
                        return self.into_vectors(parsed, inputs.len());
                    }

                    let body = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!("Embedding request returned {}, retrying ({})", status, attempt);
                        tokio::time::sleep(self.retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(EmbeddingError::Provider {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(err) => {
                    if is_retryable_error(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!("Embedding request failed: {}, retrying ({})", err, attempt);
                        tokio::time::sleep(self.retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }

    fn into_vectors(
        &self,
        mut parsed: EmbeddingResponse,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != expected {
            return Err(EmbeddingError::InvalidResponse(format!(
                "{} embeddings for {} inputs",
                parsed.data.len(),
                expected
            )));
        }
        parsed
            .data
            .into_iter()
            .map(|entry| {
                if entry.embedding.len() == self.embedding_dim {
                    Ok(entry.embedding)
                } else {
                    Err(EmbeddingError::DimensionMismatch {
                        expected: self.embedding_dim,
                        actual: entry.embedding.len(),
                    })
                }
            })
            .collect()
    }

    fn retry_backoff(&self, attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        self.retry_base_delay * (1 << capped)
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

#[async_trait(?Send)]
impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        debug!("Embedded {} texts", vectors.len());
        Ok(vectors)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
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
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> OpenAiConfig {
        OpenAiConfig {
            base_url: server.uri(),
            model: "test-embed".to_string(),
            dimensions: Some(2),
            max_retries: 3,
            batch_size: 2,
            retry_base_delay: Duration::from_millis(1),
            ..OpenAiConfig::new("sk-test")
        }
    }

    fn texts(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_embeds_in_index_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "test-embed", "dimensions": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(config(&server)).unwrap();
        let vectors = embedder.embed_documents(&texts(&["a", "b"])).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_splits_into_batches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [1.0, 0.0]}, {"index": 1, "embedding": [1.0, 0.0]}]
            })))
            .expect(2)
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(config(&server)).unwrap();
        let vectors = embedder
            .embed_documents(&texts(&["a", "b", "c", "d"]))
            .await
            .unwrap();
        assert_eq!(vectors.len(), 4);
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [0.6, 0.8]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(config(&server)).unwrap();
        let vector = embedder.embed_query("github account").await.unwrap();
        assert_eq!(vector, vec![0.6, 0.8]);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .expect(3)
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(config(&server)).unwrap();
        let err = embedder.embed_query("q").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Provider { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_client_errors_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(config(&server)).unwrap();
        match embedder.embed_query("q").await {
            Err(EmbeddingError::Provider { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad key");
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wrong_dimension_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [1.0, 0.0, 0.0]}]
            })))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(config(&server)).unwrap();
        let err = embedder.embed_query("q").await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        let embedder = OpenAiEmbedder::new(OpenAiConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            max_retries: 1,
            ..OpenAiConfig::new("sk-test")
        })
        .unwrap();
        let err = embedder.embed_query("q").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::RequestFailed(_)));
    }

    #[test]
    fn test_config_validation() {
        assert!(OpenAiEmbedder::new(OpenAiConfig::new("  ")).is_err());
        let unknown = OpenAiConfig {
            model: "custom-model".to_string(),
            ..OpenAiConfig::new("sk-test")
        };
        assert!(matches!(
            OpenAiEmbedder::new(unknown),
            Err(EmbeddingError::InvalidConfig(_))
        ));

        let embedder = OpenAiEmbedder::new(OpenAiConfig::new("sk-test")).unwrap();
        assert_eq!(embedder.model_id(), "text-embedding-3-large");
        assert_eq!(embedder.embedding_dim(), 3072);
    }
}
