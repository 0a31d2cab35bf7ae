use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use crate::error::PipelineError;

mod types;

pub use types::{ArticleBatch, ArticleHit, RawArticle, RawCategory, RawDate, RawTag};

const DEFAULT_BASE_URL: &str = "https://kg.diffbot.com/kg/v3";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const SERVICE: &str = "content-search";

/// One search invocation against the content provider. At least one of
/// `query`/`tag` must be non-empty; the orchestrator enforces that before
/// any network call happens.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub query: Option<String>,
    pub tag: Option<String>,
    pub size: usize,
    pub offset: usize,
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub token: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            token: std::env::var("DIFFBOT_API_KEY").ok(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl SearchConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(base) = std::env::var("DIFFBOT_BASE_URL") {
            cfg.base_url = base;
        }
        cfg
    }
}

#[async_trait]
pub trait ArticleSearch: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<ArticleBatch, PipelineError>;
}

#[derive(Clone)]
pub struct SearchClient {
    http: HttpClient,
    cfg: SearchConfig,
}

impl SearchClient {
    pub fn new(cfg: SearchConfig) -> Result<Self, PipelineError> {
        let http = HttpClient::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| PipelineError::http(SERVICE, e))?;
        Ok(Self { http, cfg })
    }

    fn resolve_token(&self) -> Result<String, PipelineError> {
        if let Some(token) = &self.cfg.token {
            return Ok(token.clone());
        }
        std::env::var("DIFFBOT_API_KEY")
            .map_err(|_| PipelineError::MissingCredentials("DIFFBOT_API_KEY"))
    }

    fn endpoint(&self) -> String {
        format!("{}/dql", self.cfg.base_url.trim_end_matches('/'))
    }
}

/// Build the provider query string: English articles, newest first, filtered
/// by free text and/or tag label.
pub fn build_dql(request: &SearchRequest) -> String {
    let mut dql = String::from("type:Article strict:language:\"en\" sortBy:date");
    if let Some(query) = request.query.as_deref().filter(|q| !q.is_empty()) {
        dql.push_str(&format!(" text:\"{query}\""));
    }
    if let Some(tag) = request.tag.as_deref().filter(|t| !t.is_empty()) {
        dql.push_str(&format!(" tags.label:\"{tag}\""));
    }
    dql
}

#[async_trait]
impl ArticleSearch for SearchClient {
    async fn search(&self, request: &SearchRequest) -> Result<ArticleBatch, PipelineError> {
        let token = self.resolve_token()?;
        let response = self
            .http
            .get(self.endpoint())
            .query(&[
                ("query", build_dql(request)),
                ("token", token),
                ("from", request.offset.to_string()),
                ("size", request.size.to_string()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::http(SERVICE, e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::http(SERVICE, e))?;

        if !status.is_success() {
            return Err(PipelineError::Api {
                service: SERVICE,
                status,
                message: String::from_utf8_lossy(&bytes).chars().take(200).collect(),
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| PipelineError::decode(SERVICE, e.to_string()))
    }
}

/// Test double serving canned batches and recording every request.
#[derive(Default)]
pub struct MockSearch {
    batches: Mutex<VecDeque<Result<ArticleBatch, PipelineError>>>,
    calls: Mutex<Vec<SearchRequest>>,
}

impl MockSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_batch(&self, batch: Result<ArticleBatch, PipelineError>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    pub fn calls(&self) -> Vec<SearchRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArticleSearch for MockSearch {
    async fn search(&self, request: &SearchRequest) -> Result<ArticleBatch, PipelineError> {
        self.calls.lock().unwrap().push(request.clone());
        self.batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ArticleBatch::default()))
    }
}
