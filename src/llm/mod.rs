//! LLM integration for db-ask.
//!
//! Provides the completion trait the pipeline stages call, and implementations for the
//! supported providers.

pub mod factory;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod parser;
pub mod prompt;
mod transport;
pub mod types;

pub use factory::create_client;
pub use gemini::{GeminiClient, GeminiConfig};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, OpenAiConfig};
pub use parser::strip_code_fences;
pub use prompt::{Prompt, PromptTemplate};
pub use types::{Message, Role};

use async_trait::async_trait;
use std::str::FromStr;

use crate::error::Result;

/// A completion backend shared by every pipeline stage.
///
/// Callers treat every completion as unreliable and handle the error themselves.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends one conversation and returns the full reply text.
    async fn complete(&self, messages: &[Message]) -> Result<String>;

    /// Sends a rendered prompt as a system + user message pair.
    async fn complete_prompt(&self, prompt: &Prompt) -> Result<String> {
        tracing::debug!(
            template = %prompt.template,
            user_len = prompt.user.len(),
            "Sending prompt to LLM"
        );
        self.complete(&prompt.messages()).await
    }
}

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    /// Google Gemini
    #[default]
    Gemini,
    /// OpenAI (GPT-4o, etc.)
    OpenAi,
    /// Mock client for testing (no API key required)
    Mock,
}

impl LlmProvider {
    /// Returns the provider as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Mock => "mock",
        }
    }

    /// Returns the model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.5-flash",
            Self::OpenAi => "gpt-4o",
            Self::Mock => "mock",
        }
    }

    /// Returns the environment variable holding this provider's API key.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Mock => None,
        }
    }

    /// Returns true if the provider cannot run without an API key.
    pub fn requires_api_key(&self) -> bool {
        self.api_key_env().is_some()
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
