use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HashEntry {
    pub mtime_ns: u64,
    pub size: u64,
    pub method: String,
    pub chunk_size: u64,
    pub hash: String,
}

/// Content digests keyed by absolute path, persisted as JSON.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct HashCache {
    #[serde(skip)]
    path: PathBuf,
    #[serde(skip)]
    dirty: bool,
    pub entries: HashMap<String, HashEntry>,
}

impl HashCache {
    pub fn load(cache_path: &Path) -> Self {
        let mut cache = Self::default();
        if cache_path.exists() {
            if let Ok(content) = fs::read_to_string(cache_path) {
                match serde_json::from_str(&content) {
                    Ok(loaded) => cache = loaded,
                    Err(e) => tracing::warn!("ignoring unreadable hash cache {cache_path:?}: {e}"),
                }
            }
        }
        cache.path = cache_path.to_path_buf();
        cache
    }

    pub fn save(&self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        // Create parent directory if it doesn't exist
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Returns the cached digest only if the file is unchanged and was hashed the same way.
    pub fn get(&self, path: &Path, mtime_ns: u64, size: u64, method: &str, chunk_size: u64) -> Option<&str> {
        self.entries
            .get(&*path.to_string_lossy())
            .filter(|e| {
                e.mtime_ns == mtime_ns && e.size == size && e.method == method && e.chunk_size == chunk_size
            })
            .map(|e| e.hash.as_str())
    }

    pub fn set(&mut self, path: &Path, entry: HashEntry) {
        self.entries.insert(path.to_string_lossy().into_owned(), entry);
        self.dirty = true;
    }
}
