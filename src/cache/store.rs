//! Cache Storage Backends
//!
//! One uniform load/save contract over pluggable media. A local-filesystem
//! adapter and an in-memory adapter ship here; a remote object-storage
//! adapter can implement the same trait behind the same factory.
//!
//! The store is the only cross-job shared resource; `SingleFlight` provides
//! the per-key advisory lock that serializes concurrent regenerations of
//! the same repository.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use super::CacheIndex;
use crate::config::{CacheBackend, CacheConfig};
use crate::constants::cache as cache_constants;
use crate::types::{Result, TomeError};

// =============================================================================
// Store Contract
// =============================================================================

/// Uniform persistence contract for cache indices.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Load the index for a key, or `None` when absent.
    async fn load(&self, key: &str) -> Result<Option<CacheIndex>>;

    /// Persist the index for a key, replacing any previous value.
    async fn save(&self, key: &str, index: &CacheIndex) -> Result<()>;
}

/// Shared store handle.
pub type SharedStore = Arc<dyn CacheStore>;

/// Create a store from configuration.
pub fn create_store(config: &CacheConfig) -> Result<SharedStore> {
    match config.backend {
        CacheBackend::Filesystem => {
            let dir = match &config.dir {
                Some(dir) => dir.clone(),
                None => crate::config::ConfigLoader::global_cache_dir().ok_or_else(|| {
                    TomeError::Cache("cannot determine cache directory".to_string())
                })?,
            };
            Ok(Arc::new(FsStore::new(dir)))
        }
        CacheBackend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}

// =============================================================================
// Filesystem Store
// =============================================================================

/// JSON files under a cache directory, one per repository key.
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn index_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!(
            "{}.{}",
            sanitize_key(key),
            cache_constants::INDEX_EXTENSION
        ))
    }

    /// List all persisted indices, newest first.
    pub async fn list(&self) -> Result<Vec<CacheIndex>> {
        let mut indices = Vec::new();

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(indices),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path
                .extension()
                .is_some_and(|e| e == cache_constants::INDEX_EXTENSION)
                && let Ok(content) = tokio::fs::read_to_string(&path).await
                && let Ok(index) = serde_json::from_str::<CacheIndex>(&content)
            {
                indices.push(index);
            }
        }

        indices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(indices)
    }

    /// Remove every persisted index, returning how many were deleted.
    pub async fn clear(&self) -> Result<usize> {
        let mut count = 0;

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path
                .extension()
                .is_some_and(|e| e == cache_constants::INDEX_EXTENSION)
            {
                tokio::fs::remove_file(&path).await?;
                count += 1;
            }
        }

        info!("Cleared {} cache entries", count);
        Ok(count)
    }
}

#[async_trait]
impl CacheStore for FsStore {
    async fn load(&self, key: &str) -> Result<Option<CacheIndex>> {
        let path = self.index_path(key);

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let index: CacheIndex = serde_json::from_str(&content)
                    .map_err(|e| TomeError::Cache(format!("corrupt cache index '{}': {}", key, e)))?;
                debug!(
                    "Loaded cache '{}' ({} chapters, {} file hashes)",
                    key,
                    index.chapters.len(),
                    index.file_hashes.len()
                );
                Ok(Some(index))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &str, index: &CacheIndex) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.index_path(key);
        let content = serde_json::to_string_pretty(index)?;
        tokio::fs::write(&path, &content).await?;

        info!(
            "Saved cache '{}' ({} chapters, {} bytes)",
            key,
            index.chapters.len(),
            content.len()
        );
        Ok(())
    }
}

/// Flatten a repository key into a safe filename.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// =============================================================================
// Memory Store
// =============================================================================

/// Process-local map, discarded on exit. Useful for tests and one-shot runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, CacheIndex>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<CacheIndex>> {
        Ok(self.entries.get(key).map(|entry| entry.clone()))
    }

    async fn save(&self, key: &str, index: &CacheIndex) -> Result<()> {
        self.entries.insert(key.to_string(), index.clone());
        Ok(())
    }
}

// =============================================================================
// Single Flight
// =============================================================================

/// Per-key advisory lock. Two simultaneous regenerations of the same
/// repository would otherwise race on the store's read-then-write cycle.
#[derive(Default)]
pub struct SingleFlight {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a key, waiting for any in-flight holder.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RelationshipGraph;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn sample_index(repo: &str) -> CacheIndex {
        CacheIndex {
            repo: repo.to_string(),
            branch: "main".to_string(),
            model: "gpt-4o".to_string(),
            created_at: Utc::now(),
            file_paths: vec!["src/main.rs".to_string()],
            file_hashes: BTreeMap::from([(
                "src/main.rs".to_string(),
                super::super::fingerprint("fn main() {}"),
            )]),
            abstractions: vec![crate::types::Abstraction {
                name: "Entry Point".to_string(),
                description: "Program entry".to_string(),
                files: vec![0],
            }],
            relationships: RelationshipGraph::default(),
            chapter_order: vec![0],
            chapters: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_fs_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsStore::new(temp_dir.path());

        let index = sample_index("github.com/acme/widget");
        store.save("github.com/acme/widget", &index).await.unwrap();

        let loaded = store.load("github.com/acme/widget").await.unwrap().unwrap();
        assert_eq!(loaded, index);
    }

    #[tokio::test]
    async fn test_fs_store_missing_key() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsStore::new(temp_dir.path());

        assert!(store.load("github.com/none/none").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fs_store_corrupt_index_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsStore::new(temp_dir.path());

        let path = store.index_path("github.com/acme/widget");
        tokio::fs::write(&path, "not json").await.unwrap();

        assert!(store.load("github.com/acme/widget").await.is_err());
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        let index = sample_index("github.com/acme/widget");

        store.save("github.com/acme/widget", &index).await.unwrap();
        let loaded = store.load("github.com/acme/widget").await.unwrap().unwrap();
        assert_eq!(loaded, index);
        assert!(store.load("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fs_store_list_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsStore::new(temp_dir.path());

        store
            .save("github.com/acme/widget", &sample_index("github.com/acme/widget"))
            .await
            .unwrap();
        store
            .save("github.com/acme/gadget", &sample_index("github.com/acme/gadget"))
            .await
            .unwrap();

        assert_eq!(store.list().await.unwrap().len(), 2);
        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(
            sanitize_key("github.com/acme/widget"),
            "github.com_acme_widget"
        );
    }

    #[tokio::test]
    async fn test_single_flight_serializes_same_key() {
        let flight = Arc::new(SingleFlight::new());

        let guard = flight.acquire("repo").await;
        let flight2 = flight.clone();
        let contender = tokio::spawn(async move { flight2.acquire("repo").await });

        // The contender cannot acquire while the guard is held
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }
}
