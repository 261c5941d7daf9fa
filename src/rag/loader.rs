//! Document loading for indexing.

use crate::rag::monitor::FileMonitor;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Formats that are tracked for changes but cannot be read as text.
pub const BINARY_EXTENSIONS: &[&str] = &["pdf", "docx", "xlsx", "xls"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path relative to the data directory
    pub source: String,
    pub text: String,
}

/// Decode UTF-8, dropping invalid byte sequences.
pub fn decode_lossless_utf8(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

fn is_binary(ext: &str) -> bool {
    BINARY_EXTENSIONS.iter().any(|b| b.eq_ignore_ascii_case(ext))
}

/// Read every supported text document under the monitor's data directory.
pub fn load_documents(monitor: &FileMonitor) -> Vec<Document> {
    let root = monitor.data_dir();
    let mut docs = Vec::new();
    if !root.is_dir() {
        return docs;
    }

    let mut entries: Vec<_> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && monitor.is_supported(e.path()))
        .collect();
    entries.sort_by(|a, b| a.path().cmp(b.path()));

    for entry in entries {
        let path = entry.path();
        let source = path
            .strip_prefix(root)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| path.to_string_lossy().into_owned());

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        if is_binary(ext) {
            warn!("Skipping {}: .{} documents are not extracted as text", source, ext);
            continue;
        }

        match std::fs::read(path) {
            Ok(bytes) => {
                let text = decode_lossless_utf8(&bytes);
                if text.trim().is_empty() {
                    debug!("Skipping empty document {}", source);
                    continue;
                }
                docs.push(Document { source, text });
            }
            Err(e) => warn!("Cannot read {}: {}", source, e),
        }
    }

    docs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_invalid_bytes_are_dropped() {
        let bytes = [b'o', b'k', 0xFF, 0xFE, b'!'];
        assert_eq!(decode_lossless_utf8(&bytes), "ok!");
        assert_eq!(decode_lossless_utf8("退貨".as_bytes()), "退貨");
    }

    #[test]
    fn test_load_skips_binary_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("policy.txt"), "七天內可退貨").unwrap();
        fs::write(data.join("manual.pdf"), b"%PDF-1.4").unwrap();
        fs::write(data.join("blank.md"), "   ").unwrap();

        let exts: Vec<String> = ["txt", "pdf", "md"].iter().map(|s| s.to_string()).collect();
        let monitor = FileMonitor::new(&data, dir.path().join("hashes.json"), &exts);
        let docs = load_documents(&monitor);

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source, "policy.txt");
        assert_eq!(docs[0].text, "七天內可退貨");
    }
}
