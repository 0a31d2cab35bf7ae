use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DIMENSIONS: usize = 1536;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const SERVICE: &str = "embedding";

#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub dimensions: usize,
    pub timeout: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: std::env::var("NEWSGRAPH_EMBED_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            dimensions: DEFAULT_DIMENSIONS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl EmbeddingConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(base) = std::env::var("OPENAI_BASE_URL") {
            cfg.base_url = base;
        }
        if let Ok(dim) = std::env::var("NEWSGRAPH_EMBED_DIM") {
            if let Ok(parsed) = dim.parse::<usize>() {
                cfg.dimensions = parsed;
            }
        }
        if let Ok(timeout) = std::env::var("NEWSGRAPH_EMBED_TIMEOUT_SECS") {
            if let Ok(parsed) = timeout.parse::<u64>() {
                cfg.timeout = Duration::from_secs(parsed);
            }
        }
        cfg
    }
}

/// Batched text → vector mapping. One call per import batch, never per chunk.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns one vector per input text, in input order. All-or-nothing:
    /// a failed call applies none of the batch.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, PipelineError>;
}

#[derive(Clone)]
pub struct OpenAiEmbedder {
    http: HttpClient,
    cfg: EmbeddingConfig,
}

impl OpenAiEmbedder {
    pub fn new(cfg: EmbeddingConfig) -> Result<Self, PipelineError> {
        let http = HttpClient::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| PipelineError::http(SERVICE, e))?;
        Ok(Self { http, cfg })
    }

    fn resolve_api_key(&self) -> Result<String, PipelineError> {
        if let Some(key) = &self.cfg.api_key {
            return Ok(key.clone());
        }
        std::env::var("OPENAI_API_KEY")
            .map_err(|_| PipelineError::MissingCredentials("OPENAI_API_KEY"))
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.cfg.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let api_key = self.resolve_api_key()?;
        let request = ApiEmbeddingRequest {
            model: self.cfg.model.clone(),
            input: texts.to_vec(),
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::http(SERVICE, e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::http(SERVICE, e))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiErrorEnvelope>(&bytes)
                .map(|env| env.error.message)
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(PipelineError::Api {
                service: SERVICE,
                status,
                message,
            });
        }

        let parsed: ApiEmbeddingResponse = serde_json::from_slice(&bytes)
            .map_err(|e| PipelineError::decode(SERVICE, e.to_string()))?;

        // The provider tags each vector with its input index; re-order so
        // position stays the only key tying vectors back to their chunks.
        let mut rows = parsed.data;
        rows.sort_by_key(|r| r.index);

        if rows.len() != texts.len() {
            return Err(PipelineError::decode(
                SERVICE,
                format!("requested {} embeddings, got {}", texts.len(), rows.len()),
            ));
        }
        for row in &rows {
            if row.embedding.len() != self.cfg.dimensions {
                return Err(PipelineError::decode(
                    SERVICE,
                    format!(
                        "expected dim={}, got dim={}",
                        self.cfg.dimensions,
                        row.embedding.len()
                    ),
                ));
            }
        }

        Ok(rows.into_iter().map(|r| r.embedding).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| PipelineError::decode(SERVICE, "empty embedding response"))
    }
}

#[derive(Debug, Clone, Serialize)]
struct ApiEmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiEmbeddingResponse {
    data: Vec<ApiEmbeddingRow>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiEmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Deterministic embedder for tests: records every batch and derives each
/// vector from a hash of its text, so alignment can be checked exactly.
#[derive(Debug)]
pub struct MockEmbedder {
    dimensions: usize,
    calls: Mutex<Vec<Vec<String>>>,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();
        (0..self.dimensions)
            .map(|i| ((seed.rotate_left(i as u32) & 0xff) as f32) / 255.0)
            .collect()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        self.calls.lock().unwrap().push(texts.to_vec());
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        self.calls.lock().unwrap().push(vec![text.to_string()]);
        Ok(self.vector_for(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn config_for(server: &MockServer) -> EmbeddingConfig {
        EmbeddingConfig {
            api_key: Some("test".into()),
            base_url: server.url(""),
            model: DEFAULT_MODEL.to_string(),
            dimensions: 3,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn embed_documents_reorders_by_index() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({
                    "data": [
                        {"index": 1, "embedding": [0.4, 0.5, 0.6]},
                        {"index": 0, "embedding": [0.1, 0.2, 0.3]}
                    ]
                }));
            })
            .await;

        let embedder = OpenAiEmbedder::new(config_for(&server)).unwrap();
        let vectors = embedder
            .embed_documents(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(vectors[0], vec![0.1, 0.2, 0.3]);
        assert_eq!(vectors[1], vec![0.4, 0.5, 0.6]);
    }

    #[tokio::test]
    async fn length_mismatch_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({
                    "data": [{"index": 0, "embedding": [0.1, 0.2, 0.3]}]
                }));
            })
            .await;

        let embedder = OpenAiEmbedder::new(config_for(&server)).unwrap();
        let err = embedder
            .embed_documents(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[tokio::test]
    async fn service_error_surfaces_status_and_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(503)
                    .json_body(json!({"error": {"message": "overloaded"}}));
            })
            .await;

        let embedder = OpenAiEmbedder::new(config_for(&server)).unwrap();
        let err = embedder
            .embed_documents(&["a".to_string()])
            .await
            .unwrap_err();
        match err {
            PipelineError::Api {
                status, message, ..
            } => {
                assert_eq!(status.as_u16(), 503);
                assert_eq!(message, "overloaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_batch_makes_no_call() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({"data": []}));
            })
            .await;

        let embedder = OpenAiEmbedder::new(config_for(&server)).unwrap();
        let vectors = embedder.embed_documents(&[]).await.unwrap();
        assert!(vectors.is_empty());
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn mock_embedder_is_deterministic_and_records_calls() {
        let mock = MockEmbedder::new(8);
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let vectors = mock.embed_documents(&texts).await.unwrap();

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], mock.vector_for("alpha"));
        assert_ne!(vectors[0], vectors[1]);
        assert_eq!(mock.calls(), vec![texts]);
    }
}
