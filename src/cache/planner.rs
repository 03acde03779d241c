//! Regeneration Planner
//!
//! Diffs current file fingerprints against a cached index and computes the
//! minimal regeneration plan:
//!
//! - no prior cache → full run
//! - identical file set → reuse cached result, zero LLM calls
//! - content-only changes → regenerate only the chapters whose abstractions
//!   reference a changed file
//! - structural drift (paths added or removed) → full run when
//!   `structural_refresh` is set, otherwise regenerate chapters touched by
//!   surviving changed paths

use std::collections::BTreeSet;

use tracing::{debug, info};

use super::{CacheIndex, fingerprint_files};
use crate::types::FileEntry;

/// The planner's verdict for one generation request.
#[derive(Debug, Clone, PartialEq)]
pub enum RegenPlan {
    /// Run every stage from scratch
    Full,
    /// Return the cached result without issuing any LLM call
    ReuseCached(Box<CacheIndex>),
    /// Keep the cached abstraction graph and rewrite a subset of chapters
    /// (0-based positions into the cached chapter order)
    Chapters {
        cached: Box<CacheIndex>,
        positions: Vec<usize>,
    },
}

/// Computes regeneration plans from fingerprint diffs.
pub struct RegenerationPlanner {
    structural_refresh: bool,
}

impl RegenerationPlanner {
    pub fn new(structural_refresh: bool) -> Self {
        Self { structural_refresh }
    }

    pub fn plan(&self, cached: Option<CacheIndex>, current_files: &[FileEntry]) -> RegenPlan {
        let Some(cached) = cached else {
            debug!("No cached index, planning full regeneration");
            return RegenPlan::Full;
        };

        let current_hashes = fingerprint_files(current_files);

        if current_hashes == cached.file_hashes {
            info!("File set unchanged, reusing cached result");
            return RegenPlan::ReuseCached(Box::new(cached));
        }

        let cached_paths: BTreeSet<&String> = cached.file_hashes.keys().collect();
        let current_paths: BTreeSet<&String> = current_hashes.keys().collect();
        let structural_drift = cached_paths != current_paths;

        if structural_drift && self.structural_refresh {
            info!(
                "File set changed structurally ({} added, {} removed), planning full regeneration",
                current_paths.difference(&cached_paths).count(),
                cached_paths.difference(&current_paths).count()
            );
            return RegenPlan::Full;
        }

        // Paths present in both sets whose content changed, plus removed
        // paths (their chapters describe code that no longer exists)
        let changed_paths: Vec<&String> = cached
            .file_hashes
            .iter()
            .filter(|(path, hash)| current_hashes.get(*path) != Some(hash))
            .map(|(path, _)| path)
            .collect();

        let positions = self.affected_chapter_positions(&cached, &changed_paths);

        if positions.is_empty() {
            // Changes touched only files no abstraction references
            info!("Changed files are not referenced by any abstraction, reusing cached result");
            return RegenPlan::ReuseCached(Box::new(cached));
        }

        info!(
            "{} changed file(s) map to {} chapter(s) requiring regeneration",
            changed_paths.len(),
            positions.len()
        );
        RegenPlan::Chapters {
            cached: Box::new(cached),
            positions,
        }
    }

    /// Map changed paths back through the cached file list to the
    /// abstractions referencing them, then to chapter positions.
    fn affected_chapter_positions(
        &self,
        cached: &CacheIndex,
        changed_paths: &[&String],
    ) -> Vec<usize> {
        let changed_indices: BTreeSet<usize> = cached
            .file_paths
            .iter()
            .enumerate()
            .filter(|(_, path)| changed_paths.iter().any(|p| *p == *path))
            .map(|(i, _)| i)
            .collect();

        let affected_abstractions: BTreeSet<usize> = cached
            .abstractions
            .iter()
            .enumerate()
            .filter(|(_, a)| a.files.iter().any(|f| changed_indices.contains(f)))
            .map(|(i, _)| i)
            .collect();

        cached
            .chapter_order
            .iter()
            .enumerate()
            .filter(|(_, abstraction_index)| affected_abstractions.contains(abstraction_index))
            .map(|(position, _)| position)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fingerprint;
    use crate::types::{Abstraction, RelationshipGraph};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn files(entries: &[(&str, &str)]) -> Vec<FileEntry> {
        entries
            .iter()
            .map(|(path, content)| FileEntry::new(*path, *content))
            .collect()
    }

    fn cached_index(entries: &[(&str, &str)]) -> CacheIndex {
        let file_paths: Vec<String> = entries.iter().map(|(p, _)| p.to_string()).collect();
        let file_hashes: BTreeMap<String, String> = entries
            .iter()
            .map(|(p, c)| (p.to_string(), fingerprint(c)))
            .collect();

        CacheIndex {
            repo: "github.com/acme/widget".to_string(),
            branch: "main".to_string(),
            model: "gpt-4o".to_string(),
            created_at: Utc::now(),
            file_paths,
            file_hashes,
            // Abstraction 0 owns file 0, abstraction 1 owns files 1 and 2
            abstractions: vec![
                Abstraction {
                    name: "Core".to_string(),
                    description: "Core logic".to_string(),
                    files: vec![0],
                },
                Abstraction {
                    name: "Storage".to_string(),
                    description: "Persistence".to_string(),
                    files: vec![1, 2],
                },
            ],
            relationships: RelationshipGraph::default(),
            // Storage's chapter comes first
            chapter_order: vec![1, 0],
            chapters: Vec::new(),
        }
    }

    const ENTRIES: &[(&str, &str)] = &[
        ("src/core.rs", "core v1"),
        ("src/store.rs", "store v1"),
        ("src/store_fs.rs", "fs v1"),
    ];

    #[test]
    fn test_no_cache_means_full() {
        let planner = RegenerationPlanner::new(true);
        assert_eq!(planner.plan(None, &files(ENTRIES)), RegenPlan::Full);
    }

    #[test]
    fn test_unchanged_files_reuse_cache() {
        let planner = RegenerationPlanner::new(true);
        let plan = planner.plan(Some(cached_index(ENTRIES)), &files(ENTRIES));
        assert!(matches!(plan, RegenPlan::ReuseCached(_)));
    }

    #[test]
    fn test_content_change_maps_to_chapters() {
        let planner = RegenerationPlanner::new(true);
        let current = files(&[
            ("src/core.rs", "core v1"),
            ("src/store.rs", "store v2"),
            ("src/store_fs.rs", "fs v1"),
        ]);

        let plan = planner.plan(Some(cached_index(ENTRIES)), &current);
        match plan {
            RegenPlan::Chapters { positions, .. } => {
                // Storage (abstraction 1) sits at chapter position 0
                assert_eq!(positions, vec![0]);
            }
            other => panic!("expected Chapters plan, got {:?}", other),
        }
    }

    #[test]
    fn test_structural_drift_forces_full_when_configured() {
        let planner = RegenerationPlanner::new(true);
        let current = files(&[
            ("src/core.rs", "core v1"),
            ("src/store.rs", "store v1"),
            ("src/store_fs.rs", "fs v1"),
            ("src/new_module.rs", "new"),
        ]);

        let plan = planner.plan(Some(cached_index(ENTRIES)), &current);
        assert_eq!(plan, RegenPlan::Full);
    }

    #[test]
    fn test_removed_file_regenerates_its_chapter_without_refresh() {
        let planner = RegenerationPlanner::new(false);
        let current = files(&[("src/core.rs", "core v1"), ("src/store.rs", "store v1")]);

        let plan = planner.plan(Some(cached_index(ENTRIES)), &current);
        match plan {
            RegenPlan::Chapters { positions, .. } => {
                // The removed file belonged to Storage
                assert_eq!(positions, vec![0]);
            }
            other => panic!("expected Chapters plan, got {:?}", other),
        }
    }

    #[test]
    fn test_multiple_changes_cover_multiple_chapters() {
        let planner = RegenerationPlanner::new(true);
        let current = files(&[
            ("src/core.rs", "core v2"),
            ("src/store.rs", "store v2"),
            ("src/store_fs.rs", "fs v1"),
        ]);

        let plan = planner.plan(Some(cached_index(ENTRIES)), &current);
        match plan {
            RegenPlan::Chapters { positions, .. } => {
                assert_eq!(positions, vec![0, 1]);
            }
            other => panic!("expected Chapters plan, got {:?}", other),
        }
    }
}
