//! Generation Pipeline
//!
//! The fixed-topology orchestrator: one documentation job runs as a single
//! logical sequential task over one exclusively-owned `PipelineState`.
//!
//! ```text
//! FetchRepo → IdentifyAbstractions → AnalyzeRelationships
//!                 → OrderChapters → WriteChapters → CombineTutorial
//! ```
//!
//! The regeneration planner intercepts before the analytical stages to
//! decide between a full run, a partial chapter rewrite, or returning the
//! cached result with zero LLM calls. A stage-level validation failure
//! aborts the whole job; no partial document is ever published.

pub mod progress;
pub mod stages;

pub use progress::{ProgressReporter, ProgressUpdate};
pub use stages::TutorialFiles;

use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::ai::provider::SharedProvider;
use crate::cache::{
    CacheIndex, RegenPlan, RegenerationPlanner, SharedStore, SingleFlight, fingerprint_files,
};
use crate::config::Config;
use crate::context::{ContextBuilder, ContextMode};
use crate::crawler::{CrawlResult, CrawlStats, GithubCrawler};
use crate::types::{
    Abstraction, ChapterContent, FileEntry, RelationshipGraph, Result, TomeError,
    normalize_repo_url,
};

use stages::{
    AnalyzeRelationships, CombineTutorial, IdentifyAbstractions, OrderChapters, WriteChapters,
    chapters, combine, identify, order, relationships,
};

// =============================================================================
// Pipeline State
// =============================================================================

/// The single mutable record threaded through all stages of one job.
/// Created at job start, populated stage by stage, persisted into the cache
/// after a successful run.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub repo_url: String,
    pub repo_key: String,
    pub project_name: String,
    pub branch: String,
    pub files: Vec<FileEntry>,
    pub crawl_stats: CrawlStats,
    pub abstractions: Vec<Abstraction>,
    pub relationships: RelationshipGraph,
    pub chapter_order: Vec<usize>,
    pub chapters: Vec<ChapterContent>,
}

// =============================================================================
// Options and Result
// =============================================================================

/// Per-job options.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub repo_url: String,
    /// Branch or ref; `None` resolves the default branch
    pub git_ref: Option<String>,
    /// Skip the planner and regenerate everything
    pub force_full: bool,
}

/// Outcome of one generation job.
#[derive(Debug, Clone)]
pub struct TutorialResult {
    pub repo_key: String,
    pub branch: String,
    /// `(filename, content)` pairs ready to be written or served
    pub documents: Vec<(String, String)>,
    pub crawl_stats: CrawlStats,
    pub llm_calls: usize,
    pub chapters_written: usize,
    pub from_cache: bool,
    pub duration_secs: u64,
}

// =============================================================================
// Pipeline
// =============================================================================

/// Tutorial generation pipeline.
pub struct TutorialPipeline {
    config: Config,
    provider: SharedProvider,
    store: SharedStore,
    flight: SingleFlight,
    progress: ProgressReporter,
}

impl TutorialPipeline {
    pub fn new(config: Config, provider: SharedProvider, store: SharedStore) -> Self {
        Self {
            config,
            provider,
            store,
            flight: SingleFlight::new(),
            progress: ProgressReporter::new(),
        }
    }

    /// Progress channel for this pipeline's jobs.
    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    /// Run one generation job end to end.
    #[instrument(skip(self, options), fields(repo = %options.repo_url))]
    pub async fn run(&self, options: &GenerationOptions) -> Result<TutorialResult> {
        // ===== Stage 1: FetchRepo =====
        self.progress.stage("fetch_repo", "Crawling repository", 2);
        let crawler = GithubCrawler::new(&self.config.crawl)?;
        let crawl = crawler
            .crawl(&options.repo_url, options.git_ref.as_deref())
            .await?;

        self.run_with_crawl(options, crawl).await
    }

    /// Run the pipeline over already-crawled files. Embedders that fetch
    /// repositories through their own transport enter here.
    pub async fn run_with_crawl(
        &self,
        options: &GenerationOptions,
        crawl: CrawlResult,
    ) -> Result<TutorialResult> {
        let started = Instant::now();

        let repo_key = normalize_repo_url(&options.repo_url);
        let project_name = project_name_from_key(&repo_key);

        // Serialize concurrent regenerations of the same repository; the
        // cache store is the only cross-job shared resource.
        let _guard = self.flight.acquire(&repo_key).await;

        if crawl.files.is_empty() {
            return Err(TomeError::stage(
                "fetch_repo",
                "no files survived filtering; relax include/exclude patterns or the size ceiling",
            ));
        }
        self.progress.stage(
            "fetch_repo",
            format!("Fetched {} files", crawl.files.len()),
            10,
        );

        // ===== Regeneration plan =====
        let plan = if self.config.cache.enabled && !options.force_full {
            let cached = match self.store.load(&repo_key).await {
                Ok(cached) => cached,
                Err(e) => {
                    // A corrupt index must not block a fresh generation
                    warn!("Cache load failed for {}: {}", repo_key, e);
                    None
                }
            };
            RegenerationPlanner::new(self.config.cache.structural_refresh)
                .plan(cached, &crawl.files)
        } else {
            RegenPlan::Full
        };

        let mut result = match plan {
            RegenPlan::ReuseCached(cached) => {
                self.reuse_cached(options, &project_name, *cached, crawl.stats)
            }
            RegenPlan::Chapters { cached, positions } => {
                self.run_partial(options, &repo_key, &project_name, crawl, *cached, positions)
                    .await?
            }
            RegenPlan::Full => {
                self.run_full(options, &repo_key, &project_name, crawl)
                    .await?
            }
        };

        result.duration_secs = started.elapsed().as_secs();
        self.progress
            .stage(combine::STAGE, "Tutorial complete", 100);
        info!(
            "Job complete for {} ({} documents, {} LLM calls, from_cache={})",
            result.repo_key,
            result.documents.len(),
            result.llm_calls,
            result.from_cache
        );
        Ok(result)
    }

    // =========================================================================
    // Execution Paths
    // =========================================================================

    /// Return the cached tutorial without issuing any LLM call.
    fn reuse_cached(
        &self,
        options: &GenerationOptions,
        project_name: &str,
        cached: CacheIndex,
        crawl_stats: CrawlStats,
    ) -> TutorialResult {
        self.progress
            .stage(combine::STAGE, "Reusing cached tutorial", 95);

        let output = CombineTutorial::run(
            project_name,
            &options.repo_url,
            &cached.abstractions,
            &cached.relationships,
            &cached.chapter_order,
            &cached.chapters,
        );

        TutorialResult {
            repo_key: cached.repo,
            branch: cached.branch,
            documents: output.files,
            crawl_stats,
            llm_calls: 0,
            chapters_written: 0,
            from_cache: true,
            duration_secs: 0,
        }
    }

    /// Full run: all analytical stages plus every chapter.
    async fn run_full(
        &self,
        options: &GenerationOptions,
        repo_key: &str,
        project_name: &str,
        crawl: CrawlResult,
    ) -> Result<TutorialResult> {
        let builder = ContextBuilder::new(self.config.context.clone());
        let max_retries = self.config.llm.max_retries;

        let mut state = PipelineState {
            repo_url: options.repo_url.clone(),
            repo_key: repo_key.to_string(),
            project_name: project_name.to_string(),
            branch: crawl.branch.clone(),
            files: crawl.files,
            crawl_stats: crawl.stats,
            ..Default::default()
        };

        // ===== Stage 2: IdentifyAbstractions =====
        self.progress
            .stage(identify::STAGE, "Identifying abstractions", 15);
        let context = builder.build(&state.files, ContextMode::Signature);
        let listing = file_listing(&state.files, &context.included_file_indices);
        state.abstractions = IdentifyAbstractions {
            provider: &self.provider,
            max_retries,
            max_abstractions: self.config.output.max_abstractions,
        }
        .run(project_name, &context, state.files.len(), &listing)
        .await?;
        self.progress.stage(
            identify::STAGE,
            format!("{} abstractions identified", state.abstractions.len()),
            25,
        );

        // ===== Stage 3: AnalyzeRelationships =====
        self.progress
            .stage(relationships::STAGE, "Analyzing relationships", 30);
        let referenced = referenced_file_indices(&state.abstractions);
        let context = builder.build_subset(&state.files, &referenced, ContextMode::Full);
        state.relationships = AnalyzeRelationships {
            provider: &self.provider,
            max_retries,
        }
        .run(project_name, &state.abstractions, &context)
        .await?;
        self.progress.stage(
            relationships::STAGE,
            format!("{} relationships mapped", state.relationships.relationships.len()),
            40,
        );

        // ===== Stage 4: OrderChapters =====
        self.progress
            .stage(order::STAGE, "Ordering chapters", 45);
        state.chapter_order = OrderChapters {
            provider: &self.provider,
            max_retries,
        }
        .run(project_name, &state.abstractions, &state.relationships)
        .await?;
        self.progress
            .stage(order::STAGE, "Chapter order resolved", 50);

        // ===== Stage 5: WriteChapters =====
        let (chapters, written) = WriteChapters {
            provider: &self.provider,
            max_retries,
            builder: &builder,
            progress: &self.progress,
        }
        .run(
            project_name,
            &state.files,
            &state.abstractions,
            &state.chapter_order,
            Vec::new(),
        )
        .await?;
        state.chapters = chapters;

        // ===== Stage 6: CombineTutorial =====
        self.progress
            .stage(combine::STAGE, "Assembling tutorial", 95);
        let output = CombineTutorial::run(
            project_name,
            &options.repo_url,
            &state.abstractions,
            &state.relationships,
            &state.chapter_order,
            &state.chapters,
        );

        self.save_cache(&state).await;

        Ok(TutorialResult {
            repo_key: state.repo_key,
            branch: state.branch,
            documents: output.files,
            crawl_stats: state.crawl_stats,
            // One call per analytical stage plus one per chapter
            llm_calls: 3 + written,
            chapters_written: written,
            from_cache: false,
            duration_secs: 0,
        })
    }

    /// Partial run: keep the cached abstraction graph, rewrite only the
    /// chapters whose abstractions reference changed files.
    async fn run_partial(
        &self,
        options: &GenerationOptions,
        repo_key: &str,
        project_name: &str,
        crawl: CrawlResult,
        cached: CacheIndex,
        positions: Vec<usize>,
    ) -> Result<TutorialResult> {
        self.progress.stage(
            chapters::STAGE,
            format!(
                "Regenerating {} of {} chapters",
                positions.len(),
                cached.chapter_order.len()
            ),
            50,
        );

        let builder = ContextBuilder::new(self.config.context.clone());

        // Cached abstraction file indices refer to the cached path order;
        // realign the crawled contents to it.
        let files = align_files(&cached.file_paths, &crawl.files);

        let reusable: Vec<Option<ChapterContent>> = (0..cached.chapter_order.len())
            .map(|position| {
                if positions.contains(&position) {
                    None
                } else {
                    cached.chapters.get(position).cloned()
                }
            })
            .collect();

        let (chapters, written) = WriteChapters {
            provider: &self.provider,
            max_retries: self.config.llm.max_retries,
            builder: &builder,
            progress: &self.progress,
        }
        .run(
            project_name,
            &files,
            &cached.abstractions,
            &cached.chapter_order,
            reusable,
        )
        .await?;

        self.progress
            .stage(combine::STAGE, "Assembling tutorial", 95);
        let output = CombineTutorial::run(
            project_name,
            &options.repo_url,
            &cached.abstractions,
            &cached.relationships,
            &cached.chapter_order,
            &chapters,
        );

        // Persist the aligned file order so cached abstraction indices stay
        // valid for the next incremental run
        let state = PipelineState {
            repo_url: options.repo_url.clone(),
            repo_key: repo_key.to_string(),
            project_name: project_name.to_string(),
            branch: crawl.branch.clone(),
            files,
            crawl_stats: crawl.stats,
            abstractions: cached.abstractions,
            relationships: cached.relationships,
            chapter_order: cached.chapter_order,
            chapters,
        };
        self.save_cache(&state).await;

        Ok(TutorialResult {
            repo_key: state.repo_key,
            branch: state.branch,
            documents: output.files,
            crawl_stats: state.crawl_stats,
            llm_calls: written,
            chapters_written: written,
            from_cache: false,
            duration_secs: 0,
        })
    }

    /// Persist the finished graph. Cache failures degrade to a warning; the
    /// generated tutorial is already in hand.
    async fn save_cache(&self, state: &PipelineState) {
        if !self.config.cache.enabled {
            return;
        }

        let index = CacheIndex {
            repo: state.repo_key.clone(),
            branch: state.branch.clone(),
            model: self.provider.model().to_string(),
            created_at: Utc::now(),
            file_paths: state.files.iter().map(|f| f.path.clone()).collect(),
            file_hashes: fingerprint_files(&state.files),
            abstractions: state.abstractions.clone(),
            relationships: state.relationships.clone(),
            chapter_order: state.chapter_order.clone(),
            chapters: state.chapters.clone(),
        };

        if let Err(e) = self.store.save(&state.repo_key, &index).await {
            warn!("Failed to save cache for {}: {}", state.repo_key, e);
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Project name: the last segment of the normalized repository key.
fn project_name_from_key(repo_key: &str) -> String {
    repo_key
        .rsplit('/')
        .next()
        .unwrap_or(repo_key)
        .to_string()
}

/// `- index # path` listing for the identify prompt, restricted to files
/// that survived the context budget.
fn file_listing(files: &[FileEntry], included: &[usize]) -> String {
    included
        .iter()
        .filter_map(|&i| files.get(i).map(|f| format!("- {} # {}", i, f.path)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Union of all file indices referenced by any abstraction, ascending.
fn referenced_file_indices(abstractions: &[Abstraction]) -> Vec<usize> {
    let mut indices: Vec<usize> = abstractions
        .iter()
        .flat_map(|a| a.files.iter().copied())
        .collect();
    indices.sort_unstable();
    indices.dedup();
    indices
}

/// Rebuild the file list in the cached path order so cached file indices
/// stay valid. Paths that vanished keep an empty placeholder entry.
fn align_files(cached_paths: &[String], current: &[FileEntry]) -> Vec<FileEntry> {
    let by_path: std::collections::HashMap<&str, &FileEntry> =
        current.iter().map(|f| (f.path.as_str(), f)).collect();

    cached_paths
        .iter()
        .map(|path| {
            by_path
                .get(path.as_str())
                .map(|f| (*f).clone())
                .unwrap_or_else(|| FileEntry::new(path.clone(), String::new()))
        })
        .collect()
}


#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use crate::ai::provider::{LlmProvider, LlmReply, TokenUsage};
    use crate::cache::MemoryStore;
    use crate::CacheStore;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const IDENTIFY_RESPONSE: &str = "```yaml
- name: Core
  description: The core logic.
  file_indices: [0]
- name: Storage
  description: Persistence.
  file_indices: [1]
- name: Config
  description: Configuration.
  file_indices: [0, 1]
```";

    const RELATIONSHIPS_RESPONSE: &str = "```yaml
summary: |
  A sample project.
relationships:
  - from_abstraction: 0
    to_abstraction: 1
    label: stores via
  - from_abstraction: 2
    to_abstraction: 0
    label: configures
```";

    /// Routes canned stage responses by prompt markers.
    struct StageScriptProvider {
        calls: AtomicUsize,
    }

    impl StageScriptProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for StageScriptProvider {
        async fn complete(&self, prompt: &str) -> Result<LlmReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let text = if prompt.contains("Identify the") {
                IDENTIFY_RESPONSE.to_string()
            } else if prompt.contains("relationships between the abstractions") {
                RELATIONSHIPS_RESPONSE.to_string()
            } else if prompt.contains("Order ALL abstractions") {
                "```yaml\n- 2\n- 0\n- 1\n```".to_string()
            } else {
                "Chapter prose.".to_string()
            };

            Ok(LlmReply {
                text,
                usage: TokenUsage::new(100, 50),
                model: "test".to_string(),
            })
        }

        fn name(&self) -> &str {
            "stage-script"
        }

        fn model(&self) -> &str {
            "test"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    fn sample_crawl(storage_content: &str) -> CrawlResult {
        CrawlResult {
            files: vec![
                FileEntry::new("src/core.rs", "fn core() {}"),
                FileEntry::new("src/storage.rs", storage_content.to_string()),
            ],
            stats: CrawlStats {
                downloaded_count: 2,
                ..Default::default()
            },
            branch: "main".to_string(),
        }
    }

    fn pipeline() -> (TutorialPipeline, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let provider: SharedProvider = Arc::new(StageScriptProvider::new());
        let pipeline = TutorialPipeline::new(Config::default(), provider, store.clone());
        (pipeline, store)
    }

    fn options() -> GenerationOptions {
        GenerationOptions {
            repo_url: "https://github.com/acme/widget".to_string(),
            git_ref: None,
            force_full: false,
        }
    }

    #[tokio::test]
    async fn test_full_run_produces_documents_and_caches() {
        let (pipeline, store) = pipeline();

        let result = pipeline
            .run_with_crawl(&options(), sample_crawl("fn store() {}"))
            .await
            .unwrap();

        // 3 analytical calls plus one per chapter
        assert_eq!(result.llm_calls, 6);
        assert_eq!(result.chapters_written, 3);
        assert!(!result.from_cache);
        // index.md plus three chapters
        assert_eq!(result.documents.len(), 4);
        assert_eq!(result.documents[0].0, "index.md");
        // Chapter order [2, 0, 1] → Config first
        assert_eq!(result.documents[1].0, "01_config.md");
        assert!(result.documents[1].1.starts_with("# Chapter 1: Config"));

        let cached = store.load("github.com/acme/widget").await.unwrap().unwrap();
        assert_eq!(cached.abstractions.len(), 3);
        assert_eq!(cached.chapter_order, vec![2, 0, 1]);
    }

    #[tokio::test]
    async fn test_unchanged_rerun_issues_zero_llm_calls() {
        let (pipeline, _store) = pipeline();

        pipeline
            .run_with_crawl(&options(), sample_crawl("fn store() {}"))
            .await
            .unwrap();

        let second = pipeline
            .run_with_crawl(&options(), sample_crawl("fn store() {}"))
            .await
            .unwrap();

        assert!(second.from_cache);
        assert_eq!(second.llm_calls, 0);
        assert_eq!(second.documents.len(), 4);
    }

    #[tokio::test]
    async fn test_content_change_rewrites_only_affected_chapters() {
        let (pipeline, _store) = pipeline();

        pipeline
            .run_with_crawl(&options(), sample_crawl("fn store() {}"))
            .await
            .unwrap();

        // storage.rs changed; Storage and Config reference it
        let third = pipeline
            .run_with_crawl(&options(), sample_crawl("fn store_v2() {}"))
            .await
            .unwrap();

        assert!(!third.from_cache);
        assert_eq!(third.chapters_written, 2);
        assert_eq!(third.llm_calls, 2);
        assert_eq!(third.documents.len(), 4);
    }

    #[tokio::test]
    async fn test_zero_files_is_a_stage_error() {
        let (pipeline, _store) = pipeline();
        let crawl = CrawlResult {
            files: Vec::new(),
            stats: CrawlStats::default(),
            branch: "main".to_string(),
        };

        let err = pipeline.run_with_crawl(&options(), crawl).await.unwrap_err();
        assert!(err.to_string().contains("fetch_repo"));
    }

    #[tokio::test]
    async fn test_force_full_bypasses_cache() {
        let (pipeline, _store) = pipeline();
        let opts = options();

        pipeline
            .run_with_crawl(&opts, sample_crawl("fn store() {}"))
            .await
            .unwrap();

        let forced = GenerationOptions {
            force_full: true,
            ..opts
        };
        let second = pipeline
            .run_with_crawl(&forced, sample_crawl("fn store() {}"))
            .await
            .unwrap();

        assert!(!second.from_cache);
        assert_eq!(second.llm_calls, 6);
    }
}
