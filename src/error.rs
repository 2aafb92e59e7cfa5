//! Error types for db-ask.
//!
//! Defines the main error enum used throughout the pipeline.

use thiserror::Error;

/// Main error type for db-ask operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AskError {
    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// The store rejected or failed to run a statement (syntax, permission, timeout).
    #[error("Execution error: {0}")]
    Execution(String),

    /// No single valid read-only statement could be produced.
    ///
    /// `text` holds the offending generator output (empty if the completion call itself failed).
    #[error("SQL generation failed: {reason}")]
    QueryGeneration { reason: String, text: String },

    /// LLM API errors (rate limits, auth, timeouts, etc.)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A request exceeded its deadline.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AskError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a query generation error for the given generator output.
    pub fn query_generation(reason: impl Into<String>, text: impl Into<String>) -> Self {
        Self::QueryGeneration {
            reason: reason.into(),
            text: text.into(),
        }
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a timeout error with the given message.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Execution(_) => "Execution Error",
            Self::QueryGeneration { .. } => "Query Generation Error",
            Self::Llm(_) => "LLM Error",
            Self::Config(_) => "Configuration Error",
            Self::Timeout(_) => "Timeout",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using AskError.
pub type Result<T> = std::result::Result<T, AskError>;
