//! Generate Command
//!
//! Runs the full tutorial pipeline for a repository URL and writes the
//! resulting documents to the output directory. Progress updates stream to
//! the terminal as they arrive.

use std::fs;
use std::path::PathBuf;

use console::style;
use tokio::runtime::Runtime;
use tracing::info;

use crate::ai::provider::create_provider;
use crate::cache::create_store;
use crate::config::ConfigLoader;
use crate::pipeline::{GenerationOptions, TutorialPipeline};
use crate::types::Result;

/// Consolidated CLI parameters for `codetome generate`.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Repository URL to document
    pub repo_url: String,
    /// Branch or ref override
    pub branch: Option<String>,
    /// Output directory override
    pub output: Option<PathBuf>,
    /// LLM provider override
    pub provider: Option<String>,
    /// Model override
    pub model: Option<String>,
    /// Bearer token for private repositories
    pub token: Option<String>,
    /// Disable the incremental cache for this run
    pub no_cache: bool,
    /// Regenerate everything even when the cache is fresh
    pub force: bool,
}

pub fn run(options: GenerateOptions) -> Result<()> {
    let mut config = ConfigLoader::load()?;

    // CLI arguments override file and environment configuration
    if let Some(provider) = &options.provider {
        config.llm.provider = provider.clone();
    }
    if let Some(model) = &options.model {
        config.llm.model = Some(model.clone());
    }
    if let Some(token) = &options.token {
        config.crawl.token = Some(token.clone());
    }
    if options.no_cache {
        config.cache.enabled = false;
    }
    config.validate()?;

    let output_dir = options
        .output
        .clone()
        .unwrap_or_else(|| config.output.output_dir.clone());

    let provider = create_provider(&config.llm)?;
    let store = create_store(&config.cache)?;
    let pipeline = TutorialPipeline::new(config, provider, store);

    let mut progress_rx = pipeline.progress().subscribe();
    let printer = std::thread::spawn(move || {
        while let Ok(update) = progress_rx.blocking_recv() {
            let position = match (update.current_chapter, update.total_chapters) {
                (Some(current), Some(total)) => format!(" [{}/{}]", current, total),
                _ => String::new(),
            };
            println!(
                "{} {}{} {}",
                style(format!("[{:>3}%]", update.progress)).cyan(),
                style(&update.stage).bold(),
                position,
                update.message
            );
        }
    });

    let generation = GenerationOptions {
        repo_url: options.repo_url.clone(),
        git_ref: options.branch.clone(),
        force_full: options.force,
    };

    let rt = Runtime::new()?;
    let result = rt.block_on(pipeline.run(&generation));
    drop(pipeline);
    let _ = printer.join();

    let result = result?;

    fs::create_dir_all(&output_dir)?;
    for (filename, content) in &result.documents {
        fs::write(output_dir.join(filename), content)?;
    }
    info!(
        "Wrote {} documents to {}",
        result.documents.len(),
        output_dir.display()
    );

    println!();
    println!(
        "{} {} documents in {}",
        style("✓").green().bold(),
        result.documents.len(),
        style(output_dir.display()).bold()
    );
    if result.from_cache {
        println!("  Served from cache (no LLM calls)");
    } else {
        println!(
            "  {} chapters written, {} LLM calls, {} files crawled",
            result.chapters_written, result.llm_calls, result.crawl_stats.downloaded_count
        );
    }

    Ok(())
}
