//! Per-file extraction cache.
//!
//! A single JSON store under the project's `.uncaught/` directory maps a
//! schema-versioned key per relative path to a content fingerprint plus the
//! serialized `FileExtraction`. Bumping `SCHEMA_VERSION` changes the key
//! namespace and so invalidates every entry; there is no migration code.
//! Deleting the store file is always safe.
//!
//! Extraction workers read concurrently through the in-memory map; the one
//! writer flushes once after the scan completes.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::model::FileExtraction;

/// Bump to invalidate all cached extractions.
const SCHEMA_VERSION: u32 = 1;

pub const CACHE_FILENAME: &str = "cache.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    fingerprint: String,
    extraction: FileExtraction,
}

/// Cache statistics for `stats` output.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub size_bytes: u64,
}

pub struct FileCache {
    path: PathBuf,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl FileCache {
    /// Open (or create) the store under the given config directory.
    pub fn open(config_dir: &Path) -> Self {
        let path = config_dir.join(CACHE_FILENAME);
        let entries = fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str::<HashMap<String, CacheEntry>>(&content).ok())
            .unwrap_or_default();

        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    fn key(relative_path: &str) -> String {
        format!("v{}::{}", SCHEMA_VERSION, relative_path)
    }

    fn fingerprint(source: &[u8]) -> String {
        format!("{:016x}:{}", xxh3_64(source), source.len())
    }

    /// Cached extraction for a file, if the content still matches.
    pub fn get(&self, relative_path: &str, source: &[u8]) -> Option<FileExtraction> {
        let entries = self.entries.read().unwrap();
        let entry = entries.get(&Self::key(relative_path))?;
        (entry.fingerprint == Self::fingerprint(source)).then(|| entry.extraction.clone())
    }

    /// Record an extraction result.
    pub fn put(&self, relative_path: &str, source: &[u8], extraction: &FileExtraction) {
        let mut entries = self.entries.write().unwrap();
        entries.insert(
            Self::key(relative_path),
            CacheEntry {
                fingerprint: Self::fingerprint(source),
                extraction: extraction.clone(),
            },
        );
    }

    /// Write the store to disk. Failures are non-fatal: the cache is an
    /// optimization, not a source of truth.
    pub fn flush(&self) {
        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let entries = self.entries.read().unwrap();
        if let Ok(json) = serde_json::to_string(&*entries) {
            let _ = fs::write(&self.path, json);
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().unwrap().len(),
            size_bytes: fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0),
        }
    }
}
