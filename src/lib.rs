//! codetome - AI-Driven Codebase Tutorial Generator
//!
//! Crawls a hosted repository, asks an LLM to identify its major
//! subsystems, maps the relationships between them, and writes an ordered
//! sequence of beginner-friendly tutorial chapters.
//!
//! ## Core Components
//!
//! - **Crawler**: GitHub tree/blob fetching with glob filters and batched
//!   downloads
//! - **Context Builder**: token-budgeted full or signature-only context
//! - **Pipeline**: fixed five-stage orchestration with strict validation of
//!   structured LLM output
//! - **Incremental Cache**: content-fingerprint diffing and minimal chapter
//!   regeneration over pluggable stores
//! - **Cost Estimator**: pure per-phase token and price projections
//!
//! ## Quick Start
//!
//! ```ignore
//! use codetome::{Config, GenerationOptions, TutorialPipeline};
//! use codetome::ai::provider::create_provider;
//! use codetome::cache::create_store;
//!
//! let config = Config::default();
//! let provider = create_provider(&config.llm)?;
//! let store = create_store(&config.cache)?;
//! let pipeline = TutorialPipeline::new(config, provider, store);
//! let result = pipeline.run(&GenerationOptions {
//!     repo_url: "https://github.com/acme/widget".to_string(),
//!     git_ref: None,
//!     force_full: false,
//! }).await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: LLM provider abstraction, token estimation, output validation
//! - [`crawler`]: repository tree and blob fetching
//! - [`context`]: context budgeting and signature extraction
//! - [`pipeline`]: stage orchestration and progress reporting
//! - [`cache`]: incremental regeneration planning and storage
//! - [`cost`]: cost estimation

pub mod ai;
pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod context;
pub mod cost;
pub mod crawler;
pub mod pipeline;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{ErrorCategory, Result, TomeError, ValidationError};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use pipeline::{
    GenerationOptions, PipelineState, ProgressReporter, ProgressUpdate, TutorialPipeline,
    TutorialResult,
};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{LlmProvider, LlmReply, SharedProvider, create_provider};

// =============================================================================
// Crawler and Cache Re-exports
// =============================================================================

pub use cache::{CacheIndex, CacheStore, RegenPlan, RegenerationPlanner, create_store};
pub use crawler::{CrawlResult, CrawlStats, GithubCrawler};
