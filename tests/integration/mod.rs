//! Integration tests for db-ask.
//!
//! PostgreSQL tests skip themselves unless DATABASE_URL is set.

pub mod config_test;
pub mod pipeline_test;
pub mod postgres_test;
