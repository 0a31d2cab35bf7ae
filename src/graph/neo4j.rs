use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph, Query};

use crate::error::PipelineError;

use super::{GraphStore, ParamValue, Statement};

/// Bolt connection settings, resolved from the environment once at startup.
#[derive(Clone, Debug)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: std::env::var("NEO4J_PASSWORD").ok(),
            database: "neo4j".to_string(),
        }
    }
}

impl GraphConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(uri) = std::env::var("NEO4J_URI") {
            cfg.uri = uri;
        }
        if let Ok(user) = std::env::var("NEO4J_USERNAME") {
            cfg.user = user;
        }
        if let Ok(db) = std::env::var("NEO4J_DATABASE") {
            cfg.database = db;
        }
        cfg
    }
}

pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    pub async fn connect(cfg: &GraphConfig) -> Result<Self, PipelineError> {
        let password = cfg
            .password
            .clone()
            .ok_or(PipelineError::MissingCredentials("NEO4J_PASSWORD"))?;
        let config = ConfigBuilder::default()
            .uri(&cfg.uri)
            .user(&cfg.user)
            .password(&password)
            .db(cfg.database.as_str())
            .build()
            .map_err(PipelineError::from_store)?;
        let graph = Graph::connect(config)
            .await
            .map_err(PipelineError::from_store)?;
        Ok(Self { graph })
    }
}

fn to_query(statement: Statement) -> Query {
    let mut q = neo4rs::query(&statement.text);
    for (key, value) in statement.params {
        q = match value {
            ParamValue::Str(v) => q.param(&key, v),
            ParamValue::Int(v) => q.param(&key, v),
            ParamValue::Float(v) => q.param(&key, v),
            ParamValue::Bool(v) => q.param(&key, v),
            ParamValue::FloatList(v) => q.param(&key, v),
            ParamValue::StrList(v) => q.param(&key, v),
        };
    }
    q
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn execute(&self, statement: Statement) -> Result<(), PipelineError> {
        self.graph
            .run(to_query(statement))
            .await
            .map_err(PipelineError::from_store)
    }

    async fn execute_batch(&self, statements: Vec<Statement>) -> Result<(), PipelineError> {
        let queries: Vec<Query> = statements.into_iter().map(to_query).collect();
        let mut txn = self
            .graph
            .start_txn()
            .await
            .map_err(PipelineError::from_store)?;
        txn.run_queries(queries)
            .await
            .map_err(PipelineError::from_store)?;
        txn.commit().await.map_err(PipelineError::from_store)
    }

    async fn fetch_rows(
        &self,
        statement: Statement,
    ) -> Result<Vec<serde_json::Value>, PipelineError> {
        let mut stream = self
            .graph
            .execute(to_query(statement))
            .await
            .map_err(PipelineError::from_store)?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.map_err(PipelineError::from_store)? {
            let value = row
                .to::<serde_json::Value>()
                .map_err(|e| PipelineError::decode("graph", e.to_string()))?;
            rows.push(value);
        }
        Ok(rows)
    }
}
