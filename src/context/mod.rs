//! Context Builder
//!
//! Produces a token-budgeted textual context from crawled files, in one of
//! two extraction modes:
//!
//! - **Full**: verbatim content with per-file head/tail truncation, used for
//!   narrow per-chapter context
//! - **Signature**: declarations-only extraction, used for the broad
//!   whole-repository analysis where exhaustive content would exceed budget
//!
//! Candidate files are sorted so conventional entry-point filenames are
//! considered first, then appended whole in priority order until the next
//! file would exceed the budget. Files are never split mid-budget.

mod signature;

pub use signature::extract_signatures;

use crate::config::ContextConfig;
use crate::constants::context as context_constants;
use crate::types::FileEntry;

/// Extraction mode for context building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    /// Verbatim content (with per-file truncation)
    Full,
    /// Declarations-only extraction
    Signature,
}

/// A built context: the prompt text plus the file indices that survived the
/// budget cut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltContext {
    pub text: String,
    pub included_file_indices: Vec<usize>,
}

/// Token-budgeted context builder.
pub struct ContextBuilder {
    config: ContextConfig,
}

impl ContextBuilder {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Maximum context size in characters:
    /// `context_window_tokens × usage_ratio × chars_per_token`.
    pub fn max_context_chars(&self) -> usize {
        (self.config.context_window_tokens as f64
            * self.config.usage_ratio
            * context_constants::CHARS_PER_TOKEN) as usize
    }

    /// Build a context over all files.
    pub fn build(&self, files: &[FileEntry], mode: ContextMode) -> BuiltContext {
        let all: Vec<usize> = (0..files.len()).collect();
        self.build_subset(files, &all, mode)
    }

    /// Build a context over a subset of file indices (per-chapter scope).
    ///
    /// Indices not present in `files` are ignored.
    pub fn build_subset(
        &self,
        files: &[FileEntry],
        indices: &[usize],
        mode: ContextMode,
    ) -> BuiltContext {
        let budget = self.max_context_chars();

        // Priority order: entry-point style names first, then original order
        let mut candidates: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| i < files.len())
            .collect();
        candidates.sort_by_key(|&i| (priority_rank(&files[i].path), i));

        let mut text = String::new();
        let mut included = Vec::new();

        for &index in &candidates {
            let file = &files[index];
            let content = match mode {
                ContextMode::Full => self.truncate_file(&file.content),
                ContextMode::Signature => extract_signatures(&file.content),
            };
            let chunk = format_file_chunk(index, &file.path, &content);

            // Append whole files until the next would exceed the budget
            if text.len() + chunk.len() > budget {
                break;
            }
            text.push_str(&chunk);
            included.push(index);
        }

        included.sort_unstable();

        BuiltContext {
            text,
            included_file_indices: included,
        }
    }

    /// Head/tail truncation for an oversized file: keep ~80% of the per-file
    /// line allowance from the head and the rest from the tail, with an
    /// explicit omission marker between them. Content already within the
    /// allowance passes through unchanged, so the operation is idempotent.
    pub fn truncate_file(&self, content: &str) -> String {
        let allowance = self.config.max_lines_per_file.max(3);
        let lines: Vec<&str> = content.lines().collect();

        if lines.len() <= allowance {
            return content.to_string();
        }

        let head = (allowance as f64 * context_constants::TRUNCATION_HEAD_RATIO) as usize;
        // One line of the allowance is spent on the marker itself
        let tail = allowance.saturating_sub(head + 1);
        let omitted = lines.len() - head - tail;

        let mut out = String::with_capacity(content.len().min(allowance * 120));
        for line in &lines[..head] {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(&format!("... {} lines omitted ...\n", omitted));
        for line in &lines[lines.len() - tail..] {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

fn format_file_chunk(index: usize, path: &str, content: &str) -> String {
    format!("--- File {}: {} ---\n{}\n", index, path, content)
}

/// Rank a path for priority ordering: conventional entry-point filenames
/// sort before everything else, maximizing the chance that architecturally
/// significant files survive the budget cut.
fn priority_rank(path: &str) -> usize {
    const ENTRY_STEMS: &[&str] = &[
        "main", "index", "app", "page", "route", "routes", "layout", "server", "lib", "mod",
    ];

    let stem = std::path::Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    let stem = stem.to_ascii_lowercase();

    if ENTRY_STEMS.contains(&stem.as_str()) {
        0
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder_with(max_lines: usize, window_tokens: usize) -> ContextBuilder {
        ContextBuilder::new(ContextConfig {
            context_window_tokens: window_tokens,
            usage_ratio: 0.70,
            max_lines_per_file: max_lines,
        })
    }

    fn file(path: &str, content: &str) -> FileEntry {
        FileEntry::new(path, content)
    }

    #[test]
    fn test_max_context_chars() {
        let builder = builder_with(400, 1000);
        // 1000 * 0.70 * 4.0 = 2800
        assert_eq!(builder.max_context_chars(), 2800);
    }

    #[test]
    fn test_truncation_passthrough_within_allowance() {
        let builder = builder_with(10, 128_000);
        let content = "line\n".repeat(5);
        assert_eq!(builder.truncate_file(&content), content);
    }

    #[test]
    fn test_truncation_keeps_head_and_tail() {
        let builder = builder_with(10, 128_000);
        let content: String = (0..100).map(|i| format!("line{}\n", i)).collect();
        let truncated = builder.truncate_file(&content);

        assert!(truncated.contains("line0"));
        assert!(truncated.contains("line99"));
        assert!(truncated.contains("lines omitted"));
        assert!(truncated.lines().count() <= 10);
    }

    #[test]
    fn test_truncation_is_idempotent() {
        let builder = builder_with(10, 128_000);
        let content: String = (0..100).map(|i| format!("line{}\n", i)).collect();

        let once = builder.truncate_file(&content);
        let twice = builder.truncate_file(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_build_is_idempotent_within_budget() {
        let builder = builder_with(400, 128_000);
        let files = vec![file("src/main.rs", "fn main() {}\n")];

        let first = builder.build(&files, ContextMode::Full);
        let refiltered = vec![file("src/main.rs", &files[0].content.clone())];
        let second = builder.build(&refiltered, ContextMode::Full);
        assert_eq!(first, second);
    }

    #[test]
    fn test_entry_points_prioritized_under_budget_pressure() {
        // Budget fits roughly one file
        let builder = builder_with(400, 30);
        let filler = "x".repeat(50);
        let files = vec![
            file("src/helpers/strings.rs", &filler),
            file("src/main.rs", &filler),
        ];

        let built = builder.build(&files, ContextMode::Full);
        assert_eq!(built.included_file_indices, vec![1]);
        assert!(built.text.contains("src/main.rs"));
    }

    #[test]
    fn test_budget_stops_at_first_overflow() {
        // ~84 char budget: 30 * 0.7 * 4
        let builder = builder_with(400, 30);
        let files = vec![
            file("a.rs", "short"),
            file("b.rs", &"y".repeat(500)),
            file("c.rs", "also short"),
        ];

        let built = builder.build(&files, ContextMode::Full);
        // Appending stops when the next file would exceed the budget;
        // files are never split
        assert!(!built.included_file_indices.contains(&1));
        assert!(built.text.len() <= builder.max_context_chars());
    }

    #[test]
    fn test_signature_mode_strips_bodies() {
        let builder = builder_with(400, 128_000);
        let files = vec![file(
            "src/lib.rs",
            "pub fn compute() -> u32 {\n    let x = 42;\n    x\n}\n",
        )];

        let built = builder.build(&files, ContextMode::Signature);
        assert!(built.text.contains("pub fn compute() -> u32 { ... }"));
        assert!(!built.text.contains("let x = 42"));
    }

    #[test]
    fn test_build_subset_ignores_out_of_range() {
        let builder = builder_with(400, 128_000);
        let files = vec![file("a.rs", "content")];

        let built = builder.build_subset(&files, &[0, 7], ContextMode::Full);
        assert_eq!(built.included_file_indices, vec![0]);
    }

    #[test]
    fn test_included_indices_sorted() {
        let builder = builder_with(400, 128_000);
        let files = vec![
            file("zeta.rs", "a"),
            file("main.rs", "b"),
            file("alpha.rs", "c"),
        ];

        let built = builder.build(&files, ContextMode::Full);
        assert_eq!(built.included_file_indices, vec![0, 1, 2]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Truncation is idempotent for any input and any allowance.
        #[test]
        fn truncation_idempotent(
            lines in proptest::collection::vec("[ -~]{0,40}", 0..200),
            allowance in 3usize..50,
        ) {
            let builder = ContextBuilder::new(ContextConfig {
                context_window_tokens: 128_000,
                usage_ratio: 0.70,
                max_lines_per_file: allowance,
            });

            let content = lines.join("\n");
            let once = builder.truncate_file(&content);
            let twice = builder.truncate_file(&once);
            prop_assert_eq!(&once, &twice);
            prop_assert!(once.lines().count() <= allowance);
        }
    }
}
