//! Text embeddings through Ollama's HTTP API.

use crate::types::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn model_name(&self) -> &str;
}

#[derive(Clone)]
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    async fn embed_modern(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct EmbedReq<'a> {
            model: &'a str,
            input: &'a str,
        }

        #[derive(Deserialize)]
        struct EmbedResp {
            embeddings: Vec<Vec<f32>>,
        }

        let url = format!("{}/api/embed", self.base_url);
        let response = self
            .client
            .post(url)
            .json(&EmbedReq {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("failed to call /api/embed: {e}")))?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Embedding(format!(
                "/api/embed returned {status}: {}",
                normalize_err_body(&body)
            )));
        }

        let response = response
            .json::<EmbedResp>()
            .await
            .map_err(|e| AppError::Embedding(format!("bad /api/embed response: {e}")))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Embedding("/api/embed returned no embeddings".to_string()))
    }

    async fn embed_legacy(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct EmbeddingReq<'a> {
            model: &'a str,
            prompt: &'a str,
        }

        #[derive(Deserialize)]
        struct EmbeddingResp {
            embedding: Vec<f32>,
        }

        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(url)
            .json(&EmbeddingReq {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("failed to call /api/embeddings: {e}")))?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Embedding(format!(
                "/api/embeddings returned {status}: {}",
                normalize_err_body(&body)
            )));
        }

        let response = response
            .json::<EmbeddingResp>()
            .await
            .map_err(|e| AppError::Embedding(format!("bad /api/embeddings response: {e}")))?;

        if response.embedding.is_empty() {
            return Err(AppError::Embedding(
                "/api/embeddings returned an empty vector".to_string(),
            ));
        }
        Ok(response.embedding)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = text.trim();
        if input.is_empty() {
            return Err(AppError::InvalidInput(
                "cannot embed empty text input".to_string(),
            ));
        }

        // Older Ollama releases only serve /api/embeddings
        match self.embed_modern(input).await {
            Ok(vector) => Ok(vector),
            Err(modern_err) => match self.embed_legacy(input).await {
                Ok(vector) => Ok(vector),
                Err(legacy_err) => Err(AppError::Embedding(format!(
                    "embedding failed via /api/embed and /api/embeddings. \
                     modern error: {modern_err}; legacy error: {legacy_err}; \
                     ensure the model is pulled (`ollama pull {}`)",
                    self.model
                ))),
            },
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn normalize_err_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed)
        && let Some(err) = json.get("error").and_then(|v| v.as_str())
    {
        return err.to_string();
    }

    trimmed.to_string()
}
