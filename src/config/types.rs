//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/codetome/) and project (.codetome/) level
//! configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// LLM provider settings
    pub llm: LlmConfig,

    /// Repository crawl settings
    pub crawl: CrawlConfig,

    /// Context budgeting settings
    pub context: ContextConfig,

    /// Incremental cache settings
    pub cache: CacheConfig,

    /// Tutorial output settings
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            crawl: CrawlConfig::default(),
            context: ContextConfig::default(),
            cache: CacheConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `TomeError::Config` on validation failure.
    pub fn validate(&self) -> crate::types::Result<()> {
        if self.llm.timeout_secs == 0 {
            return Err(crate::types::TomeError::Config(
                "llm.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(crate::types::TomeError::Config(format!(
                "llm.temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.crawl.batch_size == 0 {
            return Err(crate::types::TomeError::Config(
                "crawl.batch_size must be greater than 0".to_string(),
            ));
        }

        if self.crawl.max_file_size == 0 {
            return Err(crate::types::TomeError::Config(
                "crawl.max_file_size must be greater than 0".to_string(),
            ));
        }

        if !(0.1..=1.0).contains(&self.context.usage_ratio) {
            return Err(crate::types::TomeError::Config(format!(
                "context.usage_ratio must be between 0.1 and 1.0, got {}",
                self.context.usage_ratio
            )));
        }

        if self.output.max_abstractions < constants::pipeline::MIN_ABSTRACTIONS {
            return Err(crate::types::TomeError::Config(format!(
                "output.max_abstractions must be at least {}, got {}",
                constants::pipeline::MIN_ABSTRACTIONS,
                self.output.max_abstractions
            )));
        }

        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

/// LLM collaborator settings.
///
/// API keys are never serialized back out; providers convert them to
/// `SecretString` internally for runtime protection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider type: "openai", "ollama"
    pub provider: String,

    /// Model name (provider-specific, None = provider default)
    pub model: Option<String>,

    /// API key override (falls back to the provider's env var)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// API base URL override (for custom/self-hosted endpoints)
    pub api_base: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum tokens to generate per call
    pub max_tokens: usize,

    /// Sampling temperature (0.0 = deterministic)
    pub temperature: f32,

    /// Maximum retries per call on retryable failures
    pub max_retries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            api_key: None,
            api_base: None,
            timeout_secs: constants::network::DEFAULT_TIMEOUT_SECS,
            max_tokens: 8192,
            temperature: 0.0,
            max_retries: constants::chain::DEFAULT_MAX_RETRIES,
        }
    }
}

// =============================================================================
// Crawl Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Bearer token for private repositories and higher rate limits
    #[serde(skip_serializing)]
    pub token: Option<String>,

    /// Include globs; when non-empty, a file must match at least one
    pub include_patterns: Vec<String>,

    /// Exclude globs; a match rejects the file
    pub exclude_patterns: Vec<String>,

    /// Per-file size ceiling in bytes
    pub max_file_size: u64,

    /// Number of blob downloads issued concurrently
    pub batch_size: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            token: None,
            include_patterns: Vec::new(),
            exclude_patterns: vec![
                "node_modules/**".to_string(),
                "dist/**".to_string(),
                "build/**".to_string(),
                "target/**".to_string(),
                "vendor/**".to_string(),
                "*.min.js".to_string(),
                "*.lock".to_string(),
                "*.svg".to_string(),
                "*.png".to_string(),
                "*.jpg".to_string(),
            ],
            max_file_size: constants::crawler::DEFAULT_MAX_FILE_SIZE,
            batch_size: constants::crawler::BLOB_BATCH_SIZE,
        }
    }
}

// =============================================================================
// Context Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Model context window in tokens
    pub context_window_tokens: usize,

    /// Fraction of the window the context builder may consume
    pub usage_ratio: f64,

    /// Per-file line allowance before head/tail truncation
    pub max_lines_per_file: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            context_window_tokens: constants::context::DEFAULT_CONTEXT_WINDOW_TOKENS,
            usage_ratio: constants::context::CONTEXT_USAGE_RATIO,
            max_lines_per_file: constants::context::MAX_LINES_PER_FILE,
        }
    }
}

// =============================================================================
// Cache Configuration
// =============================================================================

/// Storage backend selector for the incremental cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// JSON files under the cache directory
    #[default]
    Filesystem,
    /// Process-local map, discarded on exit
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether incremental regeneration is enabled
    pub enabled: bool,

    /// Storage backend
    pub backend: CacheBackend,

    /// Cache directory override (None = user cache dir)
    pub dir: Option<PathBuf>,

    /// Rerun the identify/analyze stages when the file set itself changed
    /// (paths added or removed), not just file contents
    pub structural_refresh: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Filesystem,
            dir: None,
            structural_refresh: true,
        }
    }
}

// =============================================================================
// Output Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output directory for the generated tutorial
    pub output_dir: PathBuf,

    /// Maximum number of abstractions to request from the model
    pub max_abstractions: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("tutorial"),
            max_abstractions: constants::pipeline::DEFAULT_MAX_ABSTRACTIONS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.llm.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_usage_ratio() {
        let mut config = Config::default();
        config.context.usage_ratio = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_too_few_abstractions() {
        let mut config = Config::default();
        config.output.max_abstractions = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_never_serialized() {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-secret".to_string());
        let toml = toml::to_string(&config).unwrap();
        assert!(!toml.contains("sk-secret"));
    }
}
