//! Watch the document directory and refresh the index on change.

use crate::rag::service::RagService;
use crate::types::{AppError, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const DEBOUNCE: Duration = Duration::from_millis(500);

/// Keeps the underlying watcher alive; dropping it stops watching.
pub struct DocumentWatcher {
    _watcher: RecommendedWatcher,
}

/// Start watching the data directory of `rag`.
pub fn watch_documents(rag: Arc<RagService>) -> Result<DocumentWatcher> {
    let (tx, mut rx) = mpsc::unbounded_channel::<()>();
    let data_dir = rag.monitor().data_dir().to_path_buf();

    let filter = Arc::clone(&rag);
    let mut watcher = notify::recommended_watcher(move |res: std::result::Result<Event, notify::Error>| {
        match res {
            Ok(event) => {
                let relevant = !event.kind.is_access()
                    && event.paths.iter().any(|p| filter.monitor().is_supported(p));
                if relevant {
                    let _ = tx.send(());
                }
            }
            Err(e) => error!("Document watcher error: {:?}", e),
        }
    })
    .map_err(|e| AppError::Internal(format!("Cannot create document watcher: {e}")))?;

    watcher
        .watch(&data_dir, RecursiveMode::Recursive)
        .map_err(|e| AppError::Internal(format!("Cannot watch {}: {e}", data_dir.display())))?;

    tokio::spawn(async move {
        while rx.recv().await.is_some() {
            // Collapse bursts of events into one refresh
            tokio::time::sleep(DEBOUNCE).await;
            while rx.try_recv().is_ok() {}

            match rag.refresh().await {
                Ok(outcome) => info!("Index refreshed after document change: {:?}", outcome),
                Err(e) => warn!("Index refresh failed, keeping previous index: {}", e),
            }
        }
    });

    info!("Watching {:?} for document changes", data_dir);
    Ok(DocumentWatcher { _watcher: watcher })
}
