//! LLM client abstraction.
//!
//! Chat answers, question condensing and greetings all go through
//! [`LLMClient`], so the server can run against Ollama in production and a
//! scripted mock in tests.

use crate::types::Result;
use crate::utils::toml_config::OllamaConfig;
use async_trait::async_trait;
use std::sync::Arc;

/// Generic LLM client trait for provider abstraction
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion from a single prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Build the chat client described by the `[ollama]` config section.
pub fn create_client(config: &OllamaConfig) -> Result<Arc<dyn LLMClient>> {
    let client = super::ollama::OllamaClient::new(
        &config.base_url,
        config.chat_model.clone(),
        config.request_timeout(),
    )?;
    Ok(Arc::new(client))
}
