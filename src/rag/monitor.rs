//! Change detection for the document directory.
//!
//! Every supported file under the data directory is fingerprinted with
//! SHA-1. Fingerprints are cached as a JSON object keyed by the file's path
//! relative to the data directory; comparing a fresh scan with the cache tells
//! whether the index has to be rebuilt.

use crate::types::{AppError, Result};
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Relative path (always `/`-separated) to hex digest.
pub type Fingerprints = BTreeMap<String, String>;

const READ_BLOCK: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum FileChange {
    Added(String),
    Modified(String),
    Deleted(String),
}

impl FileChange {
    pub fn path(&self) -> &str {
        match self {
            FileChange::Added(p) | FileChange::Modified(p) | FileChange::Deleted(p) => p,
        }
    }
}

impl fmt::Display for FileChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileChange::Added(p) => write!(f, "新增: {p}"),
            FileChange::Modified(p) => write!(f, "修改: {p}"),
            FileChange::Deleted(p) => write!(f, "刪除: {p}"),
        }
    }
}

/// Result of comparing the data directory against the cache.
#[derive(Debug, Clone, Default)]
pub struct ChangeReport {
    pub current: Fingerprints,
    pub changes: Vec<FileChange>,
}

impl ChangeReport {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

pub struct FileMonitor {
    data_dir: PathBuf,
    cache_file: PathBuf,
    extensions: HashSet<String>,
}

impl FileMonitor {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        cache_file: impl Into<PathBuf>,
        extensions: &[String],
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache_file: cache_file.into(),
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.contains(&e.to_ascii_lowercase()))
    }

    /// Fingerprint every supported file. Unreadable files are skipped.
    pub fn scan_directory(&self) -> Fingerprints {
        let mut hashes = Fingerprints::new();
        if !self.data_dir.is_dir() {
            warn!("Data directory {:?} does not exist", self.data_dir);
            return hashes;
        }

        for entry in WalkDir::new(&self.data_dir).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || !self.is_supported(path) {
                continue;
            }

            let Some(key) = relative_key(&self.data_dir, path) else {
                continue;
            };
            match fingerprint_file(path) {
                Ok(digest) => {
                    debug!("Scanned {} -> {}", key, &digest[..10]);
                    hashes.insert(key, digest);
                }
                Err(e) => warn!("Cannot read {:?}: {}", path, e),
            }
        }

        hashes
    }

    /// Previously saved fingerprints; empty when there is no usable cache.
    pub fn load_cached_hashes(&self) -> Fingerprints {
        if !self.cache_file.exists() {
            info!("No fingerprint cache found, treating as first run");
            return Fingerprints::new();
        }

        let parsed = std::fs::read_to_string(&self.cache_file)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str::<Fingerprints>(&s).map_err(|e| e.to_string()));
        match parsed {
            Ok(hashes) => {
                debug!("Loaded {} cached fingerprints", hashes.len());
                hashes
            }
            Err(e) => {
                warn!("Failed to load fingerprint cache {:?}: {}", self.cache_file, e);
                Fingerprints::new()
            }
        }
    }

    pub fn save_hashes(&self, hashes: &Fingerprints) -> Result<()> {
        if let Some(parent) = self.cache_file.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(hashes)
            .map_err(|e| AppError::Internal(format!("Failed to encode fingerprints: {e}")))?;
        std::fs::write(&self.cache_file, json)?;
        info!("Saved {} fingerprints to {:?}", hashes.len(), self.cache_file);
        Ok(())
    }

    /// Scan and compare against the cache without writing anything.
    pub fn check_changes(&self) -> ChangeReport {
        let current = self.scan_directory();
        let cached = self.load_cached_hashes();
        let changes = diff_fingerprints(&current, &cached);

        if changes.is_empty() {
            info!("No document changes detected");
        } else {
            info!("Detected {} document change(s)", changes.len());
            for change in &changes {
                info!("  - {}", change);
            }
        }

        ChangeReport { current, changes }
    }
}

/// Added and modified files in scan order, followed by deletions.
pub fn diff_fingerprints(current: &Fingerprints, cached: &Fingerprints) -> Vec<FileChange> {
    let mut changes = Vec::new();
    for (path, digest) in current {
        match cached.get(path) {
            None => changes.push(FileChange::Added(path.clone())),
            Some(old) if old != digest => changes.push(FileChange::Modified(path.clone())),
            Some(_) => {}
        }
    }
    changes.extend(
        cached
            .keys()
            .filter(|p| !current.contains_key(*p))
            .map(|p| FileChange::Deleted(p.clone())),
    );
    changes
}

/// SHA-1 of a file, read in 4 KiB blocks.
pub fn fingerprint_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buf = [0u8; READ_BLOCK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
