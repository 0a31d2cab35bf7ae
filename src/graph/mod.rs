use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::PipelineError;

pub mod neo4j;
pub mod schema;

pub use neo4j::{GraphConfig, Neo4jStore};

/// A Cypher statement plus its bound parameters. Statements are the only
/// thing that crosses the store boundary, so tests can inspect exactly what
/// would be written.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    pub params: Vec<(String, ParamValue)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    FloatList(Vec<f64>),
    StrList(Vec<String>),
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    pub fn param_value(&self, key: &str) -> Option<&ParamValue> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        ParamValue::FloatList(v)
    }
}

// Bolt carries floats as f64; vectors arrive from the embedding client as f32.
impl From<&[f32]> for ParamValue {
    fn from(v: &[f32]) -> Self {
        ParamValue::FloatList(v.iter().map(|&x| x as f64).collect())
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        ParamValue::StrList(v)
    }
}

/// Explicit store-client handle passed into each component. Created once at
/// process start, shared by reference, never a module-level singleton.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Run one auto-committed statement (index DDL and the like).
    async fn execute(&self, statement: Statement) -> Result<(), PipelineError>;

    /// Run a batch of statements inside a single write transaction.
    async fn execute_batch(&self, statements: Vec<Statement>) -> Result<(), PipelineError>;

    /// Run a read statement and return its rows.
    async fn fetch_rows(&self, statement: Statement)
        -> Result<Vec<serde_json::Value>, PipelineError>;
}

pub fn decode_row<T: DeserializeOwned>(row: serde_json::Value) -> Result<T, PipelineError> {
    serde_json::from_value(row).map_err(|e| PipelineError::decode("graph", e.to_string()))
}

/// Test double that records every statement and serves canned rows.
#[derive(Default)]
pub struct RecordingStore {
    pub executed: Mutex<Vec<Statement>>,
    pub batches: Mutex<Vec<Vec<Statement>>>,
    pub rows: Mutex<VecDeque<Vec<serde_json::Value>>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_rows(&self, rows: Vec<serde_json::Value>) {
        self.rows.lock().unwrap().push_back(rows);
    }

    pub fn batches(&self) -> Vec<Vec<Statement>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn executed(&self) -> Vec<Statement> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl GraphStore for RecordingStore {
    async fn execute(&self, statement: Statement) -> Result<(), PipelineError> {
        self.executed.lock().unwrap().push(statement);
        Ok(())
    }

    async fn execute_batch(&self, statements: Vec<Statement>) -> Result<(), PipelineError> {
        self.batches.lock().unwrap().push(statements);
        Ok(())
    }

    async fn fetch_rows(
        &self,
        _statement: Statement,
    ) -> Result<Vec<serde_json::Value>, PipelineError> {
        Ok(self.rows.lock().unwrap().pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_params_accumulate_in_order() {
        let stmt = Statement::new("MERGE (a:Article {id: $id}) SET a.sentiment = $sentiment")
            .param("id", "art-1")
            .param("sentiment", 0.25);
        assert_eq!(stmt.params.len(), 2);
        assert_eq!(
            stmt.param_value("id"),
            Some(&ParamValue::Str("art-1".to_string()))
        );
        assert_eq!(stmt.param_value("sentiment"), Some(&ParamValue::Float(0.25)));
    }

    #[test]
    fn f32_slices_widen_to_f64_lists() {
        let vec: Vec<f32> = vec![0.5, 1.0];
        let param = ParamValue::from(vec.as_slice());
        assert_eq!(param, ParamValue::FloatList(vec![0.5, 1.0]));
    }
}
