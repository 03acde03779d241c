//! Incremental Cache
//!
//! Persists the generated abstraction/chapter graph together with a content
//! fingerprint per source file, keyed by normalized repository URL. Before a
//! run, the planner diffs current fingerprints against the cached set and
//! decides between a full run, a partial chapter regeneration, or reusing
//! the cached result outright.

mod planner;
mod store;

pub use planner::{RegenPlan, RegenerationPlanner};
pub use store::{CacheStore, FsStore, MemoryStore, SharedStore, SingleFlight, create_store};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{Abstraction, ChapterContent, FileEntry, RelationshipGraph};

// =============================================================================
// Cache Index
// =============================================================================

/// Everything needed to reuse or partially regenerate a previous run:
/// per-file content fingerprints plus the last-generated graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheIndex {
    /// Normalized repository URL (cache key)
    pub repo: String,
    /// Branch the cached run crawled
    pub branch: String,
    /// Model that generated the cached content
    pub model: String,
    /// When the cached run completed
    pub created_at: DateTime<Utc>,
    /// Crawled file paths, index-aligned with `Abstraction::files`
    pub file_paths: Vec<String>,
    /// Content fingerprint per file path
    pub file_hashes: BTreeMap<String, String>,
    pub abstractions: Vec<Abstraction>,
    pub relationships: RelationshipGraph,
    pub chapter_order: Vec<usize>,
    pub chapters: Vec<ChapterContent>,
}

impl CacheIndex {
    /// Total size of cached chapter bodies in bytes.
    pub fn content_size(&self) -> usize {
        self.chapters.iter().map(|c| c.body.len()).sum()
    }
}

// =============================================================================
// Content Fingerprints
// =============================================================================

/// SHA-256 content fingerprint, hex-encoded.
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

/// Fingerprint every file, keyed by path.
pub fn fingerprint_files(files: &[FileEntry]) -> BTreeMap<String, String> {
    files
        .iter()
        .map(|f| (f.path.clone(), fingerprint(&f.content)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(fingerprint("hello"), fingerprint("hello"));
        assert_ne!(fingerprint("hello"), fingerprint("hello "));
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let fp = fingerprint("");
        assert_eq!(fp.len(), 64);
        assert_eq!(
            fp,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_fingerprint_files_keyed_by_path() {
        let files = vec![
            FileEntry::new("a.rs", "alpha"),
            FileEntry::new("b.rs", "beta"),
        ];
        let hashes = fingerprint_files(&files);
        assert_eq!(hashes.len(), 2);
        assert_eq!(hashes["a.rs"], fingerprint("alpha"));
    }
}
