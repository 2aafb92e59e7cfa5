//! Mock database client for testing.
//!
//! Returns a scripted result or failure and records every statement it receives.

use super::{DatabaseClient, ResultSet, Row, Value};
use crate::error::{AskError, Result};
use async_trait::async_trait;
use std::sync::Mutex;

/// A recorded call to [`MockDatabaseClient::execute`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// In-memory store that answers every statement with one scripted outcome.
#[derive(Debug, Default)]
pub struct MockDatabaseClient {
    result: ResultSet,
    failure: Option<String>,
    calls: Mutex<Vec<ExecutedStatement>>,
}

impl MockDatabaseClient {
    /// Creates a mock that answers every statement with one `result` row.
    pub fn new() -> Self {
        Self::with_result(ResultSet::with_data(
            vec!["result".to_string()],
            vec![Row::new().with("result", "mock")],
        ))
    }

    /// Creates a mock that answers every statement with `result`.
    pub fn with_result(result: ResultSet) -> Self {
        Self {
            result,
            ..Self::default()
        }
    }

    /// Creates a mock that answers every statement with zero rows.
    pub fn empty(columns: Vec<String>) -> Self {
        Self::with_result(ResultSet::with_data(columns, Vec::new()))
    }

    /// Creates a mock whose every execution fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Returns every statement executed so far.
    pub fn calls(&self) -> Vec<ExecutedStatement> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Returns the number of statements executed so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ResultSet> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ExecutedStatement {
                sql: sql.to_string(),
                params: params.to_vec(),
            });
        }

        match &self.failure {
            Some(message) => Err(AskError::execution(message.clone())),
            None => Ok(self.result.clone()),
        }
    }
}
