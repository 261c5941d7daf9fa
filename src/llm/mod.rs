//! LLM client for answer generation.
//!
//! - [`LLMClient`] - the trait the chat engine talks to
//! - [`OllamaClient`] - chat completions against a local Ollama server

/// Core LLM client trait and factory.
pub mod client;
pub mod ollama;

pub use client::{LLMClient, create_client};
pub use ollama::OllamaClient;
