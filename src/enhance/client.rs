use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::error::PipelineError;

const DEFAULT_BASE_URL: &str = "https://kg.diffbot.com/kg/v3";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const SERVICE: &str = "knowledge";

#[derive(Clone, Debug)]
pub struct EnhanceConfig {
    pub token: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            token: std::env::var("DIFFBOT_API_KEY").ok(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl EnhanceConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(base) = std::env::var("DIFFBOT_BASE_URL") {
            cfg.base_url = base;
        }
        cfg
    }
}

/// Lookup response from the knowledge API. The nested entity stays a raw
/// value only until `store` extracts the typed organization record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnhanceResponse {
    #[serde(default)]
    pub data: Vec<EnhanceHit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnhanceHit {
    #[serde(default)]
    pub entity: serde_json::Value,
}

#[async_trait]
pub trait EntityEnhancer: Send + Sync {
    async fn enhance(&self, name: &str, kind: &str) -> Result<EnhanceResponse, PipelineError>;
}

#[derive(Clone)]
pub struct KnowledgeClient {
    http: HttpClient,
    cfg: EnhanceConfig,
}

impl KnowledgeClient {
    pub fn new(cfg: EnhanceConfig) -> Result<Self, PipelineError> {
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
        format!("{}/enhance", self.cfg.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl EntityEnhancer for KnowledgeClient {
    async fn enhance(&self, name: &str, kind: &str) -> Result<EnhanceResponse, PipelineError> {
        let token = self.resolve_token()?;
        let response = self
            .http
            .get(self.endpoint())
            .query(&[("type", kind), ("name", name), ("token", token.as_str())])
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

/// Test double keyed by entity name.
#[derive(Default)]
pub struct MockEnhancer {
    responses: Mutex<HashMap<String, EnhanceResponse>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockEnhancer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: &str, response: EnhanceResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(name.to_string(), response);
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EntityEnhancer for MockEnhancer {
    async fn enhance(&self, name: &str, kind: &str) -> Result<EnhanceResponse, PipelineError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), kind.to_string()));
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default())
    }
}
