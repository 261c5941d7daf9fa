//! TOML-based configuration for the Foodie server
//!
//! Every setting has a default, so the server runs without a `foodie.toml`.
//! The only environment override is `OLLAMA_URL`, which replaces
//! `ollama.base_url` (a `.env` file is loaded first by the binary).
//!
//! # Hot Reloading
//!
//! `ConfigManager` keeps the current configuration behind an `ArcSwap` and can
//! watch the file for changes. Settings read per request (stream pacing,
//! retrieval depth) pick up new values immediately; settings consumed at
//! startup (bind address, models) need a restart.

use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Environment variable that overrides `ollama.base_url`.
pub const OLLAMA_URL_ENV: &str = "OLLAMA_URL";

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "foodie.toml";

/// Quiet period after a file event before the configuration is re-read.
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(300);

/// Root configuration structure loaded from foodie.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoodieConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub rag: RagConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub stream: StreamConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============= Ollama Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_chat_model() -> String {
    "llama3.2-vision:11b".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text:latest".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

impl OllamaConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// ============= RAG Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Directory holding the source documents
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory holding the persisted index
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Fingerprint cache file, resolved next to the data directory
    #[serde(default = "default_hash_cache")]
    pub hash_cache: String,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_similarity_top_k")]
    pub similarity_top_k: usize,

    /// Lowercase file extensions (without the dot) that are indexed
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("storage")
}

fn default_hash_cache() -> String {
    "file_hashes.json".to_string()
}

fn default_chunk_size() -> usize {
    800
}

fn default_chunk_overlap() -> usize {
    120
}

fn default_similarity_top_k() -> usize {
    5
}

fn default_extensions() -> Vec<String> {
    ["txt", "pdf", "docx", "md", "json", "xlsx", "xls", "csv"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl RagConfig {
    /// Location of the fingerprint cache: `<data_dir>/../<hash_cache>`.
    pub fn hash_cache_path(&self) -> PathBuf {
        let parent = self
            .data_dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        parent.join(&self.hash_cache)
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            storage_dir: default_storage_dir(),
            hash_cache: default_hash_cache(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            similarity_top_k: default_similarity_top_k(),
            extensions: default_extensions(),
        }
    }
}

// ============= Session Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_timeout")]
    pub timeout_secs: u64,

    /// Token budget of each session's chat memory
    #[serde(default = "default_token_limit")]
    pub token_limit: usize,
}

fn default_session_timeout() -> u64 {
    3600
}

fn default_token_limit() -> usize {
    3000
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_session_timeout(),
            token_limit: default_token_limit(),
        }
    }
}

// ============= Stream Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_words_per_chunk")]
    pub words_per_chunk: usize,

    #[serde(default = "default_chunk_delay")]
    pub chunk_delay_ms: u64,
}

fn default_words_per_chunk() -> usize {
    5
}

fn default_chunk_delay() -> u64 {
    100
}

impl StreamConfig {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            words_per_chunk: default_words_per_chunk(),
            chunk_delay_ms: default_chunk_delay(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl From<ConfigError> for crate::types::AppError {
    fn from(err: ConfigError) -> Self {
        crate::types::AppError::Configuration(err.to_string())
    }
}

impl FoodieConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults. `OLLAMA_URL` is applied on top.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let content = fs::read_to_string(path)?;
            Self::from_toml_str(&content)?
        } else {
            info!("No configuration file at {:?}, using defaults", path);
            Self::default()
        };

        if let Ok(url) = std::env::var(OLLAMA_URL_ENV)
            && !url.trim().is_empty()
        {
            config.ollama.base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration text without touching the environment
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: FoodieConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rag = &self.rag;
        if rag.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "rag.chunk_size must be greater than 0".to_string(),
            ));
        }
        if rag.chunk_overlap >= rag.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                rag.chunk_overlap, rag.chunk_size
            )));
        }
        if rag.similarity_top_k == 0 {
            return Err(ConfigError::ValidationError(
                "rag.similarity_top_k must be greater than 0".to_string(),
            ));
        }
        if self.stream.words_per_chunk == 0 {
            return Err(ConfigError::ValidationError(
                "stream.words_per_chunk must be greater than 0".to_string(),
            ));
        }
        if self.session.token_limit == 0 {
            return Err(ConfigError::ValidationError(
                "session.token_limit must be greater than 0".to_string(),
            ));
        }
        if !matches!(self.server.log_format.as_str(), "pretty" | "json") {
            warn!(
                "Unknown server.log_format '{}', falling back to pretty",
                self.server.log_format
            );
        }
        Ok(())
    }
}

// ============= Hot Reloading Configuration Manager =============

/// Thread-safe configuration manager with hot reloading support
pub struct ConfigManager {
    config: Arc<ArcSwap<FoodieConfig>>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
}

impl ConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Absolute path for reliable file watching
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let config = FoodieConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
            watcher: RwLock::new(None),
        })
    }

    /// Create a config manager directly from a config (useful for testing)
    /// This won't have file watching capabilities.
    pub fn from_config(config: FoodieConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from(DEFAULT_CONFIG_FILE),
            watcher: RwLock::new(None),
        }
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<FoodieConfig> {
        self.config.load_full()
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Manually reload the configuration from disk
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!("Reloading configuration from {:?}", self.config_path);

        let new_config = FoodieConfig::load(&self.config_path)?;
        self.config.store(Arc::new(new_config));

        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Start watching for configuration file changes
    pub fn start_watching(&self) -> Result<(), ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let watched_file = self.config_path.clone();
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    let touches_config = event.paths.iter().any(|p| p == &watched_file);
                    if touches_config && (event.kind.is_modify() || event.kind.is_create()) {
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!("Config watcher error: {:?}", e);
                }
            }
        })?;

        // Watch the parent directory so editors that replace the file are seen
        if let Some(parent) = self.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        let config_path = self.config_path.clone();
        let config_arc = Arc::clone(&self.config);
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                // Wait for the burst to settle, then load the latest contents once
                tokio::time::sleep(RELOAD_DEBOUNCE).await;
                while rx.try_recv().is_ok() {}

                match FoodieConfig::load(&config_path) {
                    Ok(new_config) => {
                        config_arc.store(Arc::new(new_config));
                        info!("Configuration hot-reloaded successfully");
                    }
                    Err(e) => {
                        warn!(
                            "Failed to hot-reload config: {}. Keeping previous config.",
                            e
                        );
                    }
                }
            }
        });

        info!("Configuration hot-reload watcher started");
        Ok(())
    }

    /// Stop watching for configuration changes
    pub fn stop_watching(&self) {
        *self.watcher.write() = None;
        info!("Configuration hot-reload watcher stopped");
    }
}
