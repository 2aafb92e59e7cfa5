//! Mock LLM client for testing.
//!
//! Provides deterministic responses based on input patterns and records every request so
//! tests can inspect which prompts reached the model.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::{AskError, Result};
use crate::llm::types::Message;
use crate::llm::LlmClient;

/// Reply used when no pattern matches.
pub const DEFAULT_MOCK_RESPONSE: &str =
    "I don't understand that question. Could you please rephrase it?";

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Failure(String),
}

/// Completion client that answers from a list of substring patterns.
///
/// Patterns are matched case-insensitively against the system and user text of the
/// request, in the order they were added. Clones share the recorded calls.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    /// Pattern mappings, checked in insertion order.
    replies: Vec<(String, Reply)>,
    /// Failure returned when no pattern matches.
    fallback_failure: Option<String>,
    calls: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockLlmClient {
    /// Creates a new mock client with the default response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock with one canned reply per pipeline stage, used by `--provider mock`.
    ///
    /// Selection picks `customers`, generation returns a customer count and both answer
    /// templates get a fixed sentence, so a run against the built-in schema completes.
    pub fn demo() -> Self {
        Self::new()
            .with_response(
                "schema reasoning",
                r#"{"tables": ["customers"], "columns": {"customers": ["customer_id"]}}"#,
            )
            .with_response(
                "sql generator",
                "```sql\nSELECT COUNT(customer_id) AS customer_count FROM customers;\n```",
            )
            .with_response("data analyst", "This answer comes from the mock model.")
    }

    /// Creates a mock whose every call fails with an LLM error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fallback_failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Adds a custom response mapping.
    ///
    /// When the input contains `pattern`, the mock will return `response`.
    pub fn with_response(mut self, pattern: impl Into<String>, response: impl Into<String>) -> Self {
        self.replies
            .push((pattern.into().to_lowercase(), Reply::Text(response.into())));
        self
    }

    /// Adds a failing mapping: when the input contains `pattern`, the call fails.
    pub fn with_failure(mut self, pattern: impl Into<String>, message: impl Into<String>) -> Self {
        self.replies
            .push((pattern.into().to_lowercase(), Reply::Failure(message.into())));
        self
    }

    /// Returns the messages of every call made so far.
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Returns the number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    fn reply_for(&self, input: &str) -> Result<String> {
        let input_lower = input.to_lowercase();

        let reply = self
            .replies
            .iter()
            .find(|(pattern, _)| input_lower.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone());

        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Failure(message)) => Err(AskError::llm(message)),
            None => match &self.fallback_failure {
                Some(message) => Err(AskError::llm(message.clone())),
                None => Ok(DEFAULT_MOCK_RESPONSE.to_string()),
            },
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }

        let input = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.reply_for(&input)
    }
}
