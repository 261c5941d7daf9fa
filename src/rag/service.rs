//! Index lifecycle: decide between loading and rebuilding, and serve retrieval.

use crate::rag::chunker::TextChunker;
use crate::rag::embeddings::{Embedder, OllamaEmbedder};
use crate::rag::index::{IndexedChunk, ScoredChunk, VectorIndex};
use crate::rag::loader::load_documents;
use crate::rag::monitor::{FileChange, FileMonitor};
use crate::types::{AppError, Result};
use crate::utils::toml_config::FoodieConfig;
use arc_swap::ArcSwap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Why and how the index was (re)established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// No persisted index existed
    Created { documents: usize, chunks: usize },
    /// A persisted index existed but was stale
    Rebuilt {
        reason: RebuildReason,
        documents: usize,
        chunks: usize,
    },
    /// The persisted index was loaded from disk
    Loaded { chunks: usize },
    /// Nothing changed since the index already in memory
    Unchanged { chunks: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildReason {
    Forced,
    FilesChanged(Vec<FileChange>),
    ModelChanged { stored: Option<String> },
    Unreadable,
}

impl IndexOutcome {
    pub fn chunks(&self) -> usize {
        match self {
            IndexOutcome::Created { chunks, .. }
            | IndexOutcome::Rebuilt { chunks, .. }
            | IndexOutcome::Loaded { chunks }
            | IndexOutcome::Unchanged { chunks } => *chunks,
        }
    }
}

pub struct RagService {
    monitor: Arc<FileMonitor>,
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
    storage_dir: PathBuf,
    index: ArcSwap<VectorIndex>,
    loaded: AtomicBool,
    refresh_lock: Mutex<()>,
}

impl RagService {
    pub fn new(config: &FoodieConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let rag = &config.rag;
        Ok(Self {
            monitor: Arc::new(FileMonitor::new(
                &rag.data_dir,
                rag.hash_cache_path(),
                &rag.extensions,
            )),
            chunker: TextChunker::new(rag.chunk_size, rag.chunk_overlap)?,
            index: ArcSwap::from_pointee(VectorIndex::new(embedder.model_name())),
            embedder,
            storage_dir: rag.storage_dir.clone(),
            loaded: AtomicBool::new(false),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Service backed by Ollama embeddings.
    pub fn from_config(config: &FoodieConfig) -> Result<Self> {
        let embedder = OllamaEmbedder::new(
            &config.ollama.base_url,
            config.ollama.embedding_model.clone(),
            config.ollama.request_timeout(),
        )?;
        Self::new(config, Arc::new(embedder))
    }

    pub fn monitor(&self) -> &FileMonitor {
        &self.monitor
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn is_ready(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub fn chunk_count(&self) -> usize {
        self.index.load().len()
    }

    /// Create or load the index at startup.
    pub async fn initialize(&self) -> Result<IndexOutcome> {
        self.sync(false).await
    }

    /// Re-check the documents and rebuild when anything changed.
    pub async fn refresh(&self) -> Result<IndexOutcome> {
        self.sync(false).await
    }

    /// Rebuild regardless of the change state.
    pub async fn rebuild(&self) -> Result<IndexOutcome> {
        self.sync(true).await
    }

    async fn sync(&self, force: bool) -> Result<IndexOutcome> {
        let _guard = self.refresh_lock.lock().await;

        let monitor = Arc::clone(&self.monitor);
        let storage_dir = self.storage_dir.clone();
        let ready = self.is_ready();
        let (index_exists, report, persisted) = run_blocking(move || {
            let index_exists = dir_has_entries(&storage_dir);
            let report = monitor.check_changes();
            // Only an unchanged, not yet loaded index is worth reading
            let persisted = (!force && index_exists && !ready && !report.has_changes())
                .then(|| VectorIndex::load(&storage_dir));
            (index_exists, report, persisted)
        })
        .await?;

        let reason = if force {
            Some(RebuildReason::Forced)
        } else if !index_exists {
            None
        } else if report.has_changes() {
            Some(RebuildReason::FilesChanged(report.changes.clone()))
        } else if ready {
            return Ok(IndexOutcome::Unchanged {
                chunks: self.chunk_count(),
            });
        } else {
            match persisted {
                Some(Ok(index)) if index.embedding_model == self.embedder.model_name() => {
                    let chunks = index.len();
                    self.install(index);
                    info!("No document changes, loaded existing index ({} chunks)", chunks);
                    return Ok(IndexOutcome::Loaded { chunks });
                }
                Some(Ok(index)) => Some(RebuildReason::ModelChanged {
                    stored: Some(index.embedding_model),
                }),
                Some(Err(e)) => {
                    warn!("Existing index unusable, rebuilding: {}", e);
                    Some(RebuildReason::Unreadable)
                }
                None => Some(RebuildReason::Unreadable),
            }
        };

        match &reason {
            None => info!("No index found, building a new one"),
            Some(reason) => info!("Rebuilding index: {:?}", reason),
        }

        let (index, documents) = self.build().await?;

        let monitor = Arc::clone(&self.monitor);
        let storage_dir = self.storage_dir.clone();
        let index = run_blocking(move || -> Result<VectorIndex> {
            if index_exists {
                std::fs::remove_dir_all(&storage_dir).map_err(|e| {
                    AppError::Index(format!("Failed to clear {}: {e}", storage_dir.display()))
                })?;
            }
            index.save(&storage_dir)?;
            monitor.save_hashes(&report.current)?;
            Ok(index)
        })
        .await??;

        let chunks = index.len();
        self.install(index);
        info!("Index ready: {} documents, {} chunks", documents, chunks);

        Ok(match reason {
            None => IndexOutcome::Created { documents, chunks },
            Some(reason) => IndexOutcome::Rebuilt {
                reason,
                documents,
                chunks,
            },
        })
    }

    async fn build(&self) -> Result<(VectorIndex, usize)> {
        let monitor = Arc::clone(&self.monitor);
        let docs = run_blocking(move || load_documents(&monitor)).await?;
        info!("Loaded {} documents", docs.len());

        let mut index = VectorIndex::new(self.embedder.model_name());
        for doc in &docs {
            let pieces = self.chunker.chunk(&doc.text);
            let embeddings = self.embedder.embed_batch(&pieces).await?;
            for (i, (text, embedding)) in pieces.into_iter().zip(embeddings).enumerate() {
                index.push(IndexedChunk {
                    id: format!("{}#{}", doc.source, i),
                    source: doc.source.clone(),
                    text,
                    embedding,
                });
            }
        }

        Ok((index, docs.len()))
    }

    fn install(&self, index: VectorIndex) {
        self.index.store(Arc::new(index));
        self.loaded.store(true, Ordering::Release);
    }

    /// The `k` chunks most similar to `query`.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let index = self.index.load_full();
        if index.is_empty() || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed(query).await?;
        Ok(index.search(&embedding, k))
    }
}

/// Run filesystem work off the async worker threads.
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("Index task failed: {e}")))
}

fn dir_has_entries(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::index::INDEX_FILE;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::AtomicUsize;

    struct CountingEmbedder {
        calls: AtomicUsize,
        model: String,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32, 1.0])
        }

        fn model_name(&self) -> &str {
            &self.model
        }
    }

    fn setup(model: &str) -> (tempfile::TempDir, FoodieConfig, Arc<CountingEmbedder>) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = FoodieConfig::default();
        config.rag.data_dir = dir.path().join("data");
        config.rag.storage_dir = dir.path().join("storage");
        fs::create_dir_all(&config.rag.data_dir).unwrap();
        fs::write(config.rag.data_dir.join("policy.txt"), "Returns within 7 days.").unwrap();
        let embedder = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
            model: model.to_string(),
        });
        (dir, config, embedder)
    }

    #[tokio::test]
    async fn test_create_then_load_then_unchanged() {
        let (_dir, config, embedder) = setup("m1");
        let rag = RagService::new(&config, embedder.clone()).unwrap();

        let outcome = rag.initialize().await.unwrap();
        assert_eq!(
            outcome,
            IndexOutcome::Created {
                documents: 1,
                chunks: 1
            }
        );
        assert!(config.rag.hash_cache_path().exists());
        assert!(rag.is_ready());

        // A fresh service finds the persisted index
        let rag2 = RagService::new(&config, embedder.clone()).unwrap();
        assert_eq!(
            rag2.initialize().await.unwrap(),
            IndexOutcome::Loaded { chunks: 1 }
        );
        assert_eq!(
            rag2.refresh().await.unwrap(),
            IndexOutcome::Unchanged { chunks: 1 }
        );
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_file_change_triggers_rebuild() {
        let (_dir, config, embedder) = setup("m1");
        let rag = RagService::new(&config, embedder).unwrap();
        rag.initialize().await.unwrap();

        fs::write(config.rag.data_dir.join("faq.md"), "Refunds take 3 days.").unwrap();
        match rag.refresh().await.unwrap() {
            IndexOutcome::Rebuilt {
                reason: RebuildReason::FilesChanged(changes),
                documents,
                chunks,
            } => {
                assert_eq!(changes, vec![FileChange::Added("faq.md".to_string())]);
                assert_eq!(documents, 2);
                assert_eq!(chunks, 2);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_model_change_triggers_rebuild() {
        let (_dir, config, embedder) = setup("m1");
        RagService::new(&config, embedder)
            .unwrap()
            .initialize()
            .await
            .unwrap();

        let (_other, _, other_model) = setup("m2");
        let rag = RagService::new(&config, other_model).unwrap();
        match rag.initialize().await.unwrap() {
            IndexOutcome::Rebuilt {
                reason: RebuildReason::ModelChanged { stored },
                ..
            } => assert_eq!(stored.as_deref(), Some("m1")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_corrupt_index_is_rebuilt() {
        let (_dir, config, embedder) = setup("m1");
        RagService::new(&config, embedder.clone())
            .unwrap()
            .initialize()
            .await
            .unwrap();
        fs::write(config.rag.storage_dir.join(INDEX_FILE), "{ not an index").unwrap();

        let rag = RagService::new(&config, embedder).unwrap();
        assert_eq!(
            rag.initialize().await.unwrap(),
            IndexOutcome::Rebuilt {
                reason: RebuildReason::Unreadable,
                documents: 1,
                chunks: 1
            }
        );
        assert!(VectorIndex::load(&config.rag.storage_dir).is_ok());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_sync_on_single_threaded_runtime() {
        let (_dir, config, embedder) = setup("m1");
        let rag = RagService::new(&config, embedder).unwrap();

        rag.initialize().await.unwrap();
        assert_eq!(rag.refresh().await.unwrap(), IndexOutcome::Unchanged { chunks: 1 });
    }

    #[tokio::test]
    async fn test_retrieve() {
        let (_dir, config, embedder) = setup("m1");
        let rag = RagService::new(&config, embedder).unwrap();
        assert!(rag.retrieve("anything", 5).await.unwrap().is_empty());

        rag.initialize().await.unwrap();
        let hits = rag.retrieve("return policy", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "policy.txt");
    }
}
