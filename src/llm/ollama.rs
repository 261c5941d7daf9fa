use crate::llm::client::LLMClient;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, request::ChatMessageRequest},
};
use std::time::Duration;

pub const DEFAULT_OLLAMA_PORT: u16 = 11434;

/// Split an Ollama base URL into `scheme://host` and a port.
///
/// A missing or unparsable port falls back to 11434; a URL without a scheme
/// is treated as plain `http`.
pub fn split_base_url(base_url: &str) -> (String, u16) {
    let trimmed = base_url.trim().trim_end_matches('/');
    let (scheme, rest) = trimmed.split_once("://").unwrap_or(("http", trimmed));
    let authority = rest.split('/').next().unwrap_or_default();

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (host, port.parse().unwrap_or(DEFAULT_OLLAMA_PORT)),
        None => (authority, DEFAULT_OLLAMA_PORT),
    };
    let host = if host.is_empty() { "localhost" } else { host };

    (format!("{scheme}://{host}"), port)
}

pub struct OllamaClient {
    client: Ollama,
    model: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: String, timeout: Duration) -> Result<Self> {
        let (host, port) = split_base_url(base_url);
        let invalid = |reason: String| {
            AppError::Configuration(format!("invalid Ollama URL '{base_url}': {reason}"))
        };
        let mut url = reqwest::Url::parse(&host).map_err(|e| invalid(e.to_string()))?;
        url.set_port(Some(port))
            .map_err(|_| invalid("cannot carry a port".to_string()))?;

        tracing::debug!(%url, %model, "Creating Ollama chat client");
        let client = Ollama::builder().url(url).build();

        Ok(Self {
            client,
            model,
            timeout,
        })
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let messages = vec![ChatMessage::user(prompt.to_string())];
        let request = ChatMessageRequest::new(self.model.clone(), messages);

        let response = tokio::time::timeout(self.timeout, self.client.send_chat_messages(request))
            .await
            .map_err(|_| {
                AppError::LLM(format!(
                    "Ollama request timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| AppError::LLM(format!("Ollama error: {}", e)))?;

        Ok(response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
