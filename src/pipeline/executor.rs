//! Runs a validated query against the store.
//!
//! Positional parameters are bound in order, and every store failure comes back as an
//! execution error that still carries the store's message.

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::db::{DatabaseClient, ResultSet};
use crate::error::{AskError, Result};
use crate::pipeline::types::Query;

/// Runs validated queries against the store.
pub struct QueryExecutor {
    db: Arc<dyn DatabaseClient>,
}

impl QueryExecutor {
    /// Creates a new query executor.
    pub fn new(db: Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }

    /// Executes the query with its parameters bound positionally.
    ///
    /// Every store failure is reported as [`AskError::Execution`]; nothing is retried.
    pub async fn execute(&self, query: &Query) -> Result<ResultSet> {
        let params = query.positional_parameters()?;

        let start = Instant::now();
        let result = self.db.execute(query.text(), &params).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(result) => {
                info!(
                    elapsed_ms,
                    rows = result.row_count(),
                    columns = result.columns.len(),
                    "Query executed"
                );
                Ok(result)
            }
            Err(e) => {
                warn!(elapsed_ms, error = %e, "Query failed");
                Err(match e {
                    AskError::Execution(_) => e,
                    other => AskError::execution(other.to_string()),
                })
            }
        }
    }
}
