//! Crawl Filters
//!
//! Glob-based include/exclude filtering plus the per-file size ceiling.
//! Filtering happens on tree entries before any blob download so excluded
//! files never cost a network request.

use glob::Pattern;

use crate::types::{Result, TomeError};

/// Why a tree entry was rejected, or that it was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Accept,
    /// Rejected by an exclude glob, or by include globs not matching
    ExcludedByPattern,
    /// Rejected by the size ceiling
    ExcludedBySize,
}

impl FilterDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FilterDecision::Accept)
    }
}

/// Compiled include/exclude globs and size ceiling.
#[derive(Debug, Clone)]
pub struct PathFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    max_file_size: u64,
}

impl PathFilter {
    /// Compile filter patterns. Invalid globs are configuration errors.
    pub fn new(
        include_patterns: &[String],
        exclude_patterns: &[String],
        max_file_size: u64,
    ) -> Result<Self> {
        let include = compile_patterns(include_patterns)?;
        let exclude = compile_patterns(exclude_patterns)?;

        Ok(Self {
            include,
            exclude,
            max_file_size,
        })
    }

    /// Decide whether a tree entry survives filtering.
    ///
    /// Exclusion wins over inclusion; when include globs are given, a file
    /// must match at least one of them.
    pub fn evaluate(&self, path: &str, size: u64) -> FilterDecision {
        if self.exclude.iter().any(|p| p.matches(path)) {
            return FilterDecision::ExcludedByPattern;
        }

        if !self.include.is_empty() && !self.include.iter().any(|p| p.matches(path)) {
            return FilterDecision::ExcludedByPattern;
        }

        if size > self.max_file_size {
            return FilterDecision::ExcludedBySize;
        }

        FilterDecision::Accept
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p)
                .map_err(|e| TomeError::Config(format!("Invalid glob pattern '{}': {}", p, e)))
        })
        .collect()
}
