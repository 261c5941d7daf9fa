//! Retrieval Augmented Generation (RAG) Pipeline
//!
//! Answers are grounded in the policy documents under the data directory.
//!
//! # Module Structure
//!
//! - [`monitor`] - fingerprints documents and reports what changed
//! - [`loader`] - reads documents as text
//! - [`chunker`] - sentence-aware splitting with overlap
//! - [`embeddings`] - Ollama embeddings
//! - [`index`] - cosine-similarity index persisted as JSON
//! - [`service`] - create-or-load decision, atomic index swaps, retrieval
//! - [`watcher`] - refreshes the index when documents change
//!
//! # Index lifecycle
//!
//! 1. **Check** - fingerprint the data directory and compare with the cache
//! 2. **Rebuild** - when there is no index, files changed or the embedding
//!    model differs: clear storage, chunk, embed, persist, save fingerprints
//! 3. **Load** - otherwise read the persisted index
//! 4. **Retrieve** - embed the query and return the top-k chunks

pub mod chunker;
pub mod embeddings;
pub mod index;
pub mod loader;
pub mod monitor;
pub mod service;
pub mod watcher;

pub use embeddings::{Embedder, OllamaEmbedder};
pub use index::{ScoredChunk, VectorIndex};
pub use monitor::{FileChange, FileMonitor};
pub use service::{IndexOutcome, RagService, RebuildReason};
