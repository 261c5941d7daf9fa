//! Mock LLM and embedding back ends.

use async_trait::async_trait;
use foodie::llm::LLMClient;
use foodie::rag::Embedder;
use foodie::types::{AppError, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// LLM client returning a fixed reply and recording every prompt.
#[derive(Clone)]
pub struct MockLLMClient {
    response: String,
    should_fail: bool,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockLLMClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            should_fail: false,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new("")
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if self.should_fail {
            return Err(AppError::LLM("Mock LLM failure".to_string()));
        }
        Ok(self.response.clone())
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Embeds text as counts of a few marker characters, so retrieval is
/// deterministic without a model.
#[derive(Default)]
pub struct KeywordEmbedder;

const MARKERS: [char; 4] = ['退', '運', '鞋', '餐'];

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector: Vec<f32> = MARKERS
            .iter()
            .map(|m| text.chars().filter(|c| c == m).count() as f32)
            .collect();
        vector.push(0.1);
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}
