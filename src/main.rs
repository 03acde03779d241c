use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use codetome::cli::commands::generate::GenerateOptions;

#[derive(Parser)]
#[command(name = "codetome")]
#[command(
    version,
    about = "AI-driven codebase tutorial generator for hosted repositories"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a tutorial for a repository
    Generate {
        #[arg(help = "Repository URL, e.g. https://github.com/owner/repo")]
        repo_url: String,
        #[arg(long, short, help = "Branch or ref (default: repository default branch)")]
        branch: Option<String>,
        #[arg(long, short, help = "Output directory for the tutorial")]
        output: Option<PathBuf>,
        #[arg(long, help = "LLM provider (openai, ollama)")]
        provider: Option<String>,
        #[arg(long, help = "Model to use")]
        model: Option<String>,
        #[arg(long, env = "GITHUB_TOKEN", help = "Bearer token for private repositories")]
        token: Option<String>,
        #[arg(long, help = "Disable the incremental cache for this run")]
        no_cache: bool,
        #[arg(long, help = "Regenerate everything even when the cache is fresh")]
        force: bool,
    },

    /// Project token usage and cost without issuing LLM calls
    Estimate {
        #[arg(help = "Repository URL")]
        repo_url: String,
        #[arg(long, short, help = "Branch or ref")]
        branch: Option<String>,
        #[arg(long, default_value = "8", help = "Expected chapter count")]
        chapters: usize,
        #[arg(long, help = "Restrict comparison to these providers")]
        providers: Vec<String>,
        #[arg(long, env = "GITHUB_TOKEN", help = "Bearer token for private repositories")]
        token: Option<String>,
    },

    /// Inspect or clear the incremental cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cached tutorials and their sizes
    Stats,
    /// Remove every cached tutorial
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mcodetome encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }

        eprintln!("\n\x1b[33mPlease report this issue at:\x1b[0m");
        eprintln!("  https://github.com/junyeong-ai/codetome/issues");
        eprintln!();

        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Generate {
            repo_url,
            branch,
            output,
            provider,
            model,
            token,
            no_cache,
            force,
        } => {
            codetome::cli::commands::generate::run(GenerateOptions {
                repo_url,
                branch,
                output,
                provider,
                model,
                token,
                no_cache,
                force,
            })?;
        }
        Commands::Estimate {
            repo_url,
            branch,
            chapters,
            providers,
            token,
        } => {
            codetome::cli::commands::estimate::run(
                &repo_url,
                branch.as_deref(),
                chapters,
                &providers,
                token.as_deref(),
            )?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Stats => codetome::cli::commands::cache::stats()?,
            CacheAction::Clear => codetome::cli::commands::cache::clear()?,
        },
        Commands::Config { action } => match action {
            ConfigAction::Show { json } => codetome::cli::commands::config::show(json)?,
            ConfigAction::Path => codetome::cli::commands::config::path()?,
            ConfigAction::Init { global, force } => {
                if global {
                    codetome::cli::commands::config::init_global(force)?;
                } else {
                    codetome::cli::commands::config::init_project()?;
                }
            }
        },
    }

    Ok(())
}
