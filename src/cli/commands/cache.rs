//! Cache Command
//!
//! Inspect and clear the incremental-regeneration cache.

use console::style;
use tokio::runtime::Runtime;

use crate::cache::FsStore;
use crate::config::{CacheBackend, ConfigLoader};
use crate::types::{Result, TomeError};

fn fs_store() -> Result<FsStore> {
    let config = ConfigLoader::load()?;

    if config.cache.backend != CacheBackend::Filesystem {
        return Err(TomeError::Config(
            "cache commands require the filesystem backend".to_string(),
        ));
    }

    let dir = match config.cache.dir {
        Some(dir) => dir,
        None => ConfigLoader::global_cache_dir()
            .ok_or_else(|| TomeError::Cache("cannot determine cache directory".to_string()))?,
    };

    Ok(FsStore::new(dir))
}

/// Print per-repository cache statistics.
pub fn stats() -> Result<()> {
    let store = fs_store()?;
    let rt = Runtime::new()?;
    let indices = rt.block_on(store.list())?;

    if indices.is_empty() {
        println!("Cache is empty.");
        return Ok(());
    }

    println!("{}", style("Cached tutorials").bold());
    for index in &indices {
        println!(
            "  {:<40} {:>3} chapters  {:>8} bytes  {} ({})",
            index.repo,
            index.chapters.len(),
            index.content_size(),
            index.created_at.format("%Y-%m-%d %H:%M"),
            index.model
        );
    }

    Ok(())
}

/// Delete every cached tutorial.
pub fn clear() -> Result<()> {
    let store = fs_store()?;
    let rt = Runtime::new()?;
    let count = rt.block_on(store.clear())?;

    println!("Removed {} cache entr{}.", count, if count == 1 { "y" } else { "ies" });
    Ok(())
}
