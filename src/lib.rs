//! # Foodie customer-service chat server
//!
//! Session-scoped, retrieval-grounded chat over a local Ollama instance,
//! streamed to clients as server-sent events.
//!
//! ## Overview
//!
//! The crate can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `foodie-server` binary
//! 2. **As a library** - Build the router around your own LLM and embedding back ends
//!
//! ### Library Example
//!
//! ```rust,ignore
//! use foodie::{AppState, AppVariant, build_app};
//! use foodie::chat::ChatEngine;
//! use foodie::llm::create_client;
//! use foodie::rag::RagService;
//! use foodie::utils::toml_config::ConfigManager;
//! use std::sync::Arc;
//!
//! let config = Arc::new(ConfigManager::new("foodie.toml")?);
//! let snapshot = config.config();
//! let rag = Arc::new(RagService::from_config(&snapshot)?);
//! rag.initialize().await?;
//! let engine = Arc::new(ChatEngine::new(create_client(&snapshot.ollama)?, rag));
//!
//! let app = build_app(AppState::new(config, engine, AppVariant::Main));
//! ```
//!
//! ## Modules
//!
//! - [`api`] - REST handlers, routes and request validation
//! - [`chat`] - Intent routing, answer generation and SSE event streams
//! - [`llm`] - LLM client trait and the Ollama implementation
//! - [`memory`] - Token-bounded conversation memory
//! - [`rag`] - Document monitoring, chunking, embeddings and the vector index
//! - [`session`] - In-memory session registry with expiry and abort flags
//! - [`types`] - DTOs, events and error handling
//! - [`utils`] - TOML configuration with hot reload

#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Chat orchestration: intents, prompts and streaming.
pub mod chat;
/// Command-line interface.
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// Conversation memory and context management.
pub mod memory;
/// Retrieval Augmented Generation (RAG) components.
pub mod rag;
/// Chat session registry.
pub mod session;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities (TOML).
pub mod utils;

// Re-export commonly used types
pub use chat::{AnswerMode, ChatEngine};
pub use llm::LLMClient;
pub use rag::{Embedder, RagService};
pub use session::SessionManager;
pub use types::{AppError, Result};
pub use utils::toml_config::{ConfigManager, FoodieConfig};

use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Which HTTP application to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AppVariant {
    /// Item/cart endpoints plus the full chat API under `/api/v1/chat`
    #[default]
    Main,
    /// Chat API under `/api/chat` with intent routing and `/api/health`
    ChatApp,
}

impl AppVariant {
    /// How chat messages are answered in this application.
    pub fn answer_mode(self) -> AnswerMode {
        match self {
            AppVariant::Main => AnswerMode::Rag,
            AppVariant::ChatApp => AnswerMode::Routed,
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// TOML configuration with hot-reload support
    pub config: Arc<ConfigManager>,
    /// Live chat sessions
    pub sessions: Arc<SessionManager>,
    /// Answer generation over the LLM and the document index
    pub engine: Arc<ChatEngine>,
    /// Served application
    pub variant: AppVariant,
}

impl AppState {
    /// State with an empty session registry sized from the configuration.
    pub fn new(config: Arc<ConfigManager>, engine: Arc<ChatEngine>, variant: AppVariant) -> Self {
        let session = config.config().session.clone();
        Self {
            sessions: Arc::new(SessionManager::new(session.timeout(), session.token_limit)),
            config,
            engine,
            variant,
        }
    }
}

/// The router for `state.variant`, with request tracing and permissive CORS.
pub fn build_app(state: AppState) -> Router {
    api::routes::create_router(state.variant)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}
