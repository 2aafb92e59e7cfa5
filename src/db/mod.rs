//! Database abstraction layer for db-ask.
//!
//! Provides a trait-based interface for statement execution so the pipeline can run
//! against PostgreSQL or an in-memory mock interchangeably.

mod mock;
mod postgres;
mod schema;
mod types;

pub use mock::{ExecutedStatement, MockDatabaseClient};
pub use postgres::PostgresClient;
pub use schema::{Column, Relationship, SchemaDescription, Table};
pub use types::{ResultSet, Row, Value};

use crate::error::Result;
use async_trait::async_trait;

/// The relational store a validated query runs against.
///
/// Implementations acquire whatever connection they need inside `execute` and release it
/// before returning, on success and on error alike.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Executes one SQL statement with positional parameters (`$1`, `$2`, ...) bound in order.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ResultSet>;
}
