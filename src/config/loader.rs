//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/codetome/config.toml)
//! 3. Project config (.codetome/config.toml)
//! 4. Environment variables (CODETOME_* prefix)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::{debug, info};

use super::types::Config;
use crate::types::{Result, TomeError};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Merge global config
        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        // Merge project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // Merge environment variables (e.g., CODETOME_LLM_MODEL -> llm.model)
        figment = figment.merge(Env::prefixed("CODETOME_").split('_').lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| TomeError::Config(format!("Configuration error: {}", e)))?;

        // Validate configuration after loading
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| TomeError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/codetome/)
    pub fn global_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "codetome").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to global cache directory
    pub fn global_cache_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "codetome").map(|dirs| dirs.cache_dir().to_path_buf())
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".codetome/config.toml")
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".codetome")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());

        if let Some(cache) = Self::global_cache_dir() {
            let exists = if cache.exists() { "✓" } else { "✗" };
            println!("  Cache:   {} {}", exists, cache.display());
        }
    }

    /// Show current effective configuration
    pub fn show_config(as_json: bool) -> Result<()> {
        let config = Self::load()?;

        if as_json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| TomeError::Config(e.to_string()))?
            );
        }

        Ok(())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            TomeError::Config("Cannot determine global config directory".to_string())
        })?;

        fs::create_dir_all(&global_dir)?;

        if let Some(cache_dir) = Self::global_cache_dir() {
            fs::create_dir_all(&cache_dir)?;
        }

        let config_path = global_dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_global_config())?;
            info!("Created global config: {}", config_path.display());
        } else {
            info!("Global config exists: {}", config_path.display());
        }

        Ok(global_dir)
    }

    /// Initialize project configuration
    pub fn init_project() -> Result<PathBuf> {
        let project_dir = Self::project_dir();

        fs::create_dir_all(&project_dir)?;
        fs::create_dir_all(project_dir.join("cache"))?;

        let config_path = project_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, Self::default_project_config())?;
            info!("Created project config: {}", config_path.display());
        }

        Ok(project_dir)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Generate default global config content (TOML)
    fn default_global_config() -> String {
        r#"# codetome Global Configuration
# User-wide defaults. Project settings in .codetome/config.toml override these.

version = "1.0"

# LLM settings (for tutorial generation)
[llm]
provider = "openai"
timeout_secs = 300

# Incremental cache
[cache]
enabled = true
backend = "filesystem"
"#
        .to_string()
    }

    /// Generate default project config content (TOML)
    fn default_project_config() -> String {
        r#"# codetome Project Configuration
# Project-specific settings that override global defaults.

version = "1.0"

# Crawl filters
[crawl]
include_patterns = []
exclude_patterns = [
    "node_modules/**",
    "dist/**",
    "build/**",
    "target/**",
    "vendor/**",
]

# Tutorial output
[output]
output_dir = "tutorial"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_config() {
        let config = ConfigLoader::load().unwrap();
        assert_eq!(config.version, "1.0");
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[llm]
provider = "ollama"
model = "llama3"

[crawl]
max_file_size = 50000
"#,
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.llm.model.as_deref(), Some("llama3"));
        assert_eq!(config.crawl.max_file_size, 50_000);
        // Untouched sections keep their defaults
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[llm]\ntimeout_secs = 0\n").unwrap();

        assert!(ConfigLoader::load_from_file(&path).is_err());
    }
}
