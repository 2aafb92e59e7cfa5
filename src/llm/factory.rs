//! Builds the configured completion client.

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::{AskError, Result};
use crate::llm::{
    GeminiClient, GeminiConfig, LlmClient, LlmProvider, MockLlmClient, OpenAiClient, OpenAiConfig,
};

/// Creates an LLM client from the `[llm]` configuration.
///
/// The API key is resolved from the config first, then from the provider's environment
/// variable (`GEMINI_API_KEY` or `OPENAI_API_KEY`). The model falls back to the provider
/// default when none is configured.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let provider = config.provider()?;

    match provider {
        LlmProvider::Gemini => {
            let key = require_key(config, provider)?;
            let gemini = GeminiConfig::new(key, config.model()?).with_timeout(config.timeout_secs);
            Ok(Arc::new(GeminiClient::new(gemini)?))
        }
        LlmProvider::OpenAi => {
            let key = require_key(config, provider)?;
            let openai = OpenAiConfig::new(key, config.model()?).with_timeout(config.timeout_secs);
            Ok(Arc::new(OpenAiClient::new(openai)?))
        }
        LlmProvider::Mock => Ok(Arc::new(MockLlmClient::demo())),
    }
}

fn require_key(config: &LlmConfig, provider: LlmProvider) -> Result<String> {
    config.resolve_api_key()?.ok_or_else(|| {
        AskError::config(format!(
            "No API key configured for {provider}. Set llm.api_key or {}.",
            provider.api_key_env().unwrap_or("the provider's API key variable")
        ))
    })
}
