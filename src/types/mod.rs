//! Core Domain Types
//!
//! Records shared across the generation pipeline: crawled files, identified
//! abstractions, relationships, and written chapters. All cache-persisted
//! types derive serde traits so the incremental planner can round-trip them.

pub mod error;
pub mod utils;

pub use error::{ErrorCategory, ErrorClassifier, LlmError, Result, TomeError, ValidationError};
pub use utils::{capitalize_first, chapter_filename, normalize_repo_url, slugify};

use serde::{Deserialize, Serialize};

// =============================================================================
// Crawled Files
// =============================================================================

/// A single source file fetched by the crawler.
///
/// Immutable once fetched; owned by the pipeline state for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the repository root
    pub path: String,
    /// Decoded file content
    pub content: String,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

// =============================================================================
// Abstractions and Relationships
// =============================================================================

/// A named subsystem of the target repository, backed by file indices.
///
/// `files` holds indices into the crawled file list. Indices are validated
/// at parse time: out-of-range values are fatal, duplicates are normalized
/// away while preserving first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abstraction {
    pub name: String,
    pub description: String,
    pub files: Vec<usize>,
}

/// A directed edge between two abstractions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Index into the abstraction list
    pub from: usize,
    /// Index into the abstraction list
    pub to: usize,
    /// Short interaction label, e.g. "invokes" or "configures"
    pub label: String,
}

/// Project summary plus the relationship edges between abstractions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipGraph {
    pub summary: String,
    pub relationships: Vec<Relationship>,
}

impl RelationshipGraph {
    /// Abstraction indices that appear in no relationship. The prompt asks
    /// the model to cover every abstraction; this is checked after parsing
    /// and reported as a warning, never a failure.
    pub fn uncovered_abstractions(&self, abstraction_count: usize) -> Vec<usize> {
        (0..abstraction_count)
            .filter(|i| {
                !self
                    .relationships
                    .iter()
                    .any(|r| r.from == *i || r.to == *i)
            })
            .collect()
    }
}

// =============================================================================
// Chapters
// =============================================================================

/// One written tutorial chapter, corresponding to exactly one abstraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterContent {
    /// 1-based position in the final tutorial
    pub chapter_number: usize,
    /// Index into the abstraction list
    pub abstraction_index: usize,
    /// Deterministic output filename, e.g. `01_repository_crawler.md`
    pub filename: String,
    /// Chapter title (the abstraction name)
    pub title: String,
    /// Markdown body
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncovered_abstractions() {
        let graph = RelationshipGraph {
            summary: "A project.".to_string(),
            relationships: vec![
                Relationship {
                    from: 0,
                    to: 1,
                    label: "calls".to_string(),
                },
                Relationship {
                    from: 1,
                    to: 0,
                    label: "notifies".to_string(),
                },
            ],
        };

        assert!(graph.uncovered_abstractions(2).is_empty());
        assert_eq!(graph.uncovered_abstractions(4), vec![2, 3]);
    }

    #[test]
    fn test_relationship_graph_round_trip() {
        let graph = RelationshipGraph {
            summary: "Summary".to_string(),
            relationships: vec![Relationship {
                from: 0,
                to: 2,
                label: "reads from".to_string(),
            }],
        };

        let json = serde_json::to_string(&graph).unwrap();
        let back: RelationshipGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, graph);
    }
}
