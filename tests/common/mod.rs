//! Shared fixtures for the integration tests.
#![allow(dead_code)]

pub mod mocks;

use axum_test::TestServer;
use foodie::chat::ChatEngine;
use foodie::rag::RagService;
use foodie::utils::toml_config::{ConfigManager, FoodieConfig};
use foodie::{AppState, AppVariant, build_app};
use mocks::{KeywordEmbedder, MockLLMClient};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

pub const POLICY_TEXT: &str = "商品到貨七天內可以申請退貨。退貨運費由買家負擔。";

/// Configuration rooted in `dir`, with unpaced streaming.
pub fn test_config(dir: &TempDir) -> FoodieConfig {
    let mut config = FoodieConfig::default();
    config.rag.data_dir = dir.path().join("data");
    config.rag.storage_dir = dir.path().join("storage");
    config.stream.chunk_delay_ms = 0;
    config.stream.words_per_chunk = 2;
    config
}

/// Data directory with one policy document.
pub fn write_policy(config: &FoodieConfig) {
    fs::create_dir_all(&config.rag.data_dir).unwrap();
    fs::write(config.rag.data_dir.join("policy.txt"), POLICY_TEXT).unwrap();
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub llm: MockLLMClient,
    _dir: TempDir,
}

/// A served application over an initialized index and a mock LLM.
pub async fn spawn_app(variant: AppVariant, llm: MockLLMClient) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    write_policy(&config);

    let rag = Arc::new(RagService::new(&config, Arc::new(KeywordEmbedder::default())).unwrap());
    rag.initialize().await.unwrap();

    let engine = Arc::new(ChatEngine::new(Arc::new(llm.clone()), rag));
    let config = Arc::new(ConfigManager::from_config(config));
    let state = AppState::new(config, engine, variant);

    let server = TestServer::new(build_app(state.clone())).unwrap();
    TestApp {
        server,
        state,
        llm,
        _dir: dir,
    }
}

/// Decode the `data:` payloads of a `text/event-stream` body.
pub fn sse_events(body: &str) -> Vec<serde_json::Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}

pub fn event_types(events: &[serde_json::Value]) -> Vec<String> {
    events
        .iter()
        .map(|e| e["type"].as_str().unwrap().to_string())
        .collect()
}
