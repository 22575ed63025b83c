//! Cache storage backends.

use crate::keys::sanitize_key;
use async_trait::async_trait;
use chrono::Utc;
use crosscheck_core::ids::CacheEntryId;
use crosscheck_core::ports::{CacheEntry, CacheStore};
use crosscheck_core::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

/// Filesystem-backed store, one payload file plus a metadata sidecar per key.
///
/// Writes replace whole files, so two concurrent writers for the same key
/// resolve last-write-wins and readers always see one complete payload.
pub struct FilesystemStore {
    root_dir: PathBuf,
}

impl FilesystemStore {
    pub fn new(root_dir: PathBuf) -> Self {
        Self { root_dir }
    }

    fn payload_path(&self, key: &str) -> PathBuf {
        self.root_dir.join(sanitize_key(key))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root_dir.join(format!("{}.meta", sanitize_key(key)))
    }

    async fn read_meta(&self, key: &str) -> Result<CacheEntry> {
        let raw = tokio::fs::read_to_string(self.meta_path(key))
            .await
            .map_err(|e| Error::Cache(format!("failed to read cache metadata: {}", e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Cache(format!("corrupt cache metadata for {}: {}", key, e)))
    }
}

#[async_trait]
impl CacheStore for FilesystemStore {
    async fn restore(&self, key: &str) -> Result<Option<CacheEntry>> {
        let payload = self.payload_path(key);
        if !payload.exists() {
            debug!(key, "cache miss");
            return Ok(None);
        }

        let entry = self.read_meta(key).await?;
        debug!(key, size_bytes = entry.size_bytes, "cache hit");
        Ok(Some(entry))
    }

    async fn save(&self, key: &str, payload: &[u8]) -> Result<CacheEntry> {
        tokio::fs::create_dir_all(&self.root_dir)
            .await
            .map_err(|e| Error::Cache(format!("failed to create cache dir: {}", e)))?;

        tokio::fs::write(self.payload_path(key), payload)
            .await
            .map_err(|e| Error::Cache(format!("failed to write cache entry: {}", e)))?;

        let entry = CacheEntry {
            id: CacheEntryId::new(),
            key: key.to_string(),
            size_bytes: payload.len() as u64,
            created_at: Utc::now(),
        };
        let meta = serde_json::to_string(&entry)
            .map_err(|e| Error::Cache(format!("failed to encode cache metadata: {}", e)))?;
        tokio::fs::write(self.meta_path(key), meta)
            .await
            .map_err(|e| Error::Cache(format!("failed to write cache metadata: {}", e)))?;

        debug!(key, size_bytes = entry.size_bytes, "cache entry saved");
        Ok(entry)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        for path in [self.payload_path(key), self.meta_path(key)] {
            if path.exists() {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| Error::Cache(format!("failed to delete cache entry: {}", e)))?;
            }
        }
        Ok(())
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<CacheEntry>> {
        if !self.root_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root_dir)
            .await
            .map_err(|e| Error::Cache(format!("failed to read cache dir: {}", e)))?;

        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| Error::Cache(format!("failed to read cache dir: {}", e)))?
        {
            let name = item.file_name().to_string_lossy().to_string();
            let Some(key) = name.strip_suffix(".meta") else {
                continue;
            };
            match self.read_meta(key).await {
                Ok(entry) => {
                    if prefix.is_none_or(|p| entry.key.starts_with(p)) {
                        entries.push(entry);
                    }
                }
                // Corrupt sidecars degrade to absent entries.
                Err(e) => debug!(key, error = %e, "skipping unreadable cache entry"),
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

/// In-memory store for tests and single-process runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn restore(&self, key: &str) -> Result<Option<CacheEntry>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| Error::Cache("cache lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn save(&self, key: &str, payload: &[u8]) -> Result<CacheEntry> {
        let entry = CacheEntry {
            id: CacheEntryId::new(),
            key: key.to_string(),
            size_bytes: payload.len() as u64,
            created_at: Utc::now(),
        };
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::Cache("cache lock poisoned".to_string()))?;
        entries.insert(key.to_string(), entry.clone());
        Ok(entry)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::Cache("cache lock poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<CacheEntry>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| Error::Cache("cache lock poisoned".to_string()))?;
        let mut matched: Vec<CacheEntry> = entries
            .values()
            .filter(|e| prefix.is_none_or(|p| e.key.starts_with(p)))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_filesystem_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path().to_path_buf());

        assert!(store.restore("build-ubuntu-latest").await.unwrap().is_none());

        store.save("build-ubuntu-latest", b"toolchain").await.unwrap();
        let entry = store
            .restore("build-ubuntu-latest")
            .await
            .unwrap()
            .expect("hit");
        assert_eq!(entry.key, "build-ubuntu-latest");
        assert_eq!(entry.size_bytes, 9);
    }

    #[tokio::test]
    async fn test_filesystem_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path().to_path_buf());

        store.save("lint-ubuntu-latest", b"first").await.unwrap();
        store.save("lint-ubuntu-latest", b"second!").await.unwrap();

        let entry = store
            .restore("lint-ubuntu-latest")
            .await
            .unwrap()
            .expect("hit");
        assert_eq!(entry.size_bytes, 7);
    }

    #[tokio::test]
    async fn test_filesystem_list_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path().to_path_buf());

        store.save("build-ubuntu-latest", b"a").await.unwrap();
        store.save("build-windows-latest", b"b").await.unwrap();
        store.save("lint-ubuntu-latest", b"c").await.unwrap();

        let all = store.list(None).await.unwrap();
        assert_eq!(all.len(), 3);

        let build = store.list(Some("build-")).await.unwrap();
        assert_eq!(build.len(), 2);
        assert_eq!(build[0].key, "build-ubuntu-latest");
    }

    #[tokio::test]
    async fn test_filesystem_concurrent_writers_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FilesystemStore::new(dir.path().to_path_buf()));

        let a = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.save("shared", b"writer-a").await })
        };
        let b = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.save("shared", b"writer-bee").await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // Last write wins; either way the entry stays readable.
        let entry = store.restore("shared").await.unwrap().expect("hit");
        assert!(entry.size_bytes == 8 || entry.size_bytes == 10);
    }

    #[tokio::test]
    async fn test_memory_delete() {
        let store = MemoryStore::new();
        store.save("k", b"v").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.restore("k").await.unwrap().is_none());
    }
}
