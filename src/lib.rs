//! db-ask - Natural-language questions over a PostgreSQL schema.
//!
//! This library exposes the core modules for use by the binary and integration tests.

pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod logging;
pub mod pipeline;

pub use error::{AskError, Result};
pub use pipeline::{AnswerEnvelope, Pipeline};
