//! Repository Crawler
//!
//! Fetches a repository's file tree and blob contents from the GitHub REST
//! API. Tree entries are filtered by glob patterns and a size ceiling before
//! download; blob downloads run in fixed-size concurrent batches to bound
//! open connections and respect provider throttling.
//!
//! ## Failure Semantics
//!
//! - Missing/renamed/private repository: typed error classified from the
//!   HTTP status, with repository context
//! - Individual blob fetch failure: non-fatal, counted as skipped
//! - Truncated tree response: logged, not fatal

mod filters;

pub use filters::{FilterDecision, PathFilter};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::CrawlConfig;
use crate::constants::{crawler as crawler_constants, network};
use crate::types::{ErrorCategory, ErrorClassifier, FileEntry, Result, TomeError};

// =============================================================================
// Crawl Output
// =============================================================================

/// Aggregate crawl statistics for observability and cost estimation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Files downloaded and decoded successfully
    pub downloaded_count: usize,
    /// Files accepted by filters whose blob fetch or decode failed
    pub skipped_count: usize,
    /// Tree entries rejected by pattern or size filters
    pub excluded_count: usize,
    /// API requests issued during the crawl
    pub api_requests: usize,
    /// Whether the provider truncated the recursive tree listing
    pub tree_truncated: bool,
}

/// Result of one crawl: decoded files plus statistics.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub files: Vec<FileEntry>,
    pub stats: CrawlStats,
    /// Branch the tree was read from
    pub branch: String,
}

// =============================================================================
// Crawler
// =============================================================================

/// GitHub REST crawler.
pub struct GithubCrawler {
    client: reqwest::Client,
    api_base: String,
    token: Option<SecretString>,
    filter: PathFilter,
    batch_size: usize,
}

impl GithubCrawler {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let filter = PathFilter::new(
            &config.include_patterns,
            &config.exclude_patterns,
            config.max_file_size,
        )?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(network::DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(network::CONNECTION_TIMEOUT_SECS))
            .user_agent(crawler_constants::USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_base: crawler_constants::GITHUB_API_BASE.to_string(),
            token: config.token.clone().map(SecretString::from),
            filter,
            batch_size: config.batch_size.max(1),
        })
    }

    /// Override the API base URL (for GitHub Enterprise or tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Crawl a repository: resolve the branch, list the recursive tree,
    /// filter entries, and download surviving blobs in batches.
    pub async fn crawl(&self, repo_url: &str, git_ref: Option<&str>) -> Result<CrawlResult> {
        let (owner, repo) = parse_repo_url(repo_url)?;
        let mut stats = CrawlStats::default();

        let branch = match git_ref {
            Some(r) => r.to_string(),
            None => self.resolve_default_branch(repo_url, &owner, &repo, &mut stats).await?,
        };
        info!("Crawling {}/{} at '{}'", owner, repo, branch);

        let tree = self
            .fetch_tree(repo_url, &owner, &repo, &branch, &mut stats)
            .await?;
        if tree.truncated {
            stats.tree_truncated = true;
            warn!(
                "Tree listing for {}/{} was truncated by the provider; \
                 some files will be missing",
                owner, repo
            );
        }

        // Filter blob entries before any download
        let mut accepted: Vec<TreeEntry> = Vec::new();
        for entry in tree.tree {
            if entry.kind != "blob" {
                continue;
            }
            match self.filter.evaluate(&entry.path, entry.size.unwrap_or(0)) {
                FilterDecision::Accept => accepted.push(entry),
                FilterDecision::ExcludedByPattern | FilterDecision::ExcludedBySize => {
                    stats.excluded_count += 1;
                }
            }
        }
        debug!(
            "Tree filtered: {} accepted, {} excluded",
            accepted.len(),
            stats.excluded_count
        );

        // Download blobs in fixed-size batches
        let mut files = Vec::with_capacity(accepted.len());
        for chunk in accepted.chunks(self.batch_size) {
            let fetches = chunk
                .iter()
                .map(|entry| self.fetch_blob(&owner, &repo, entry));
            let results = futures::future::join_all(fetches).await;
            stats.api_requests += chunk.len();

            for (entry, result) in chunk.iter().zip(results) {
                match result {
                    Ok(content) => {
                        files.push(FileEntry::new(entry.path.clone(), content));
                        stats.downloaded_count += 1;
                    }
                    Err(e) => {
                        warn!("Skipping {}: {}", entry.path, e);
                        stats.skipped_count += 1;
                    }
                }
            }
        }

        info!(
            "Crawl complete: {} downloaded, {} skipped, {} excluded, {} requests",
            stats.downloaded_count, stats.skipped_count, stats.excluded_count, stats.api_requests
        );

        Ok(CrawlResult {
            files,
            stats,
            branch,
        })
    }

    // =========================================================================
    // API Calls
    // =========================================================================

    async fn resolve_default_branch(
        &self,
        repo_url: &str,
        owner: &str,
        repo: &str,
        stats: &mut CrawlStats,
    ) -> Result<String> {
        let url = format!("{}/repos/{}/{}", self.api_base, owner, repo);
        let response = self.get(&url).await?;
        stats.api_requests += 1;

        let response = self.check_status(response, repo_url).await?;
        let info: RepoInfo = response.json().await?;
        debug!("Resolved default branch: {}", info.default_branch);
        Ok(info.default_branch)
    }

    async fn fetch_tree(
        &self,
        repo_url: &str,
        owner: &str,
        repo: &str,
        branch: &str,
        stats: &mut CrawlStats,
    ) -> Result<TreeResponse> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.api_base, owner, repo, branch
        );
        let response = self.get(&url).await?;
        stats.api_requests += 1;

        let response = self.check_status(response, repo_url).await?;
        Ok(response.json().await?)
    }

    async fn fetch_blob(&self, owner: &str, repo: &str, entry: &TreeEntry) -> Result<String> {
        let url = format!(
            "{}/repos/{}/{}/git/blobs/{}",
            self.api_base, owner, repo, entry.sha
        );
        let response = self.get(&url).await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(TomeError::crawl(
                format!("{}/{}", owner, repo),
                ErrorClassifier::classify_status(status),
                format!("blob fetch for '{}' failed with status {}", entry.path, status),
            ));
        }

        let blob: BlobResponse = response.json().await?;
        decode_blob(&blob.content, &blob.encoding, &entry.path)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");

        if let Some(token) = &self.token {
            request = request.header(
                "Authorization",
                format!("Bearer {}", token.expose_secret()),
            );
        }

        Ok(request.send().await?)
    }

    /// Classify non-success statuses into typed crawl errors with repository
    /// context, and log rate-limit headers on the way through.
    async fn check_status(
        &self,
        response: reqwest::Response,
        repo_url: &str,
    ) -> Result<reqwest::Response> {
        log_rate_limit(&response);

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let category = ErrorClassifier::classify_status(status);
        let message = match category {
            ErrorCategory::NotFound => {
                "repository not found, renamed, or private (provide a token for private repos)"
                    .to_string()
            }
            ErrorCategory::Auth => "authentication rejected by the hosting API".to_string(),
            ErrorCategory::RateLimit => "hosting API rate limit exceeded".to_string(),
            _ => format!("hosting API returned status {}", status),
        };

        Err(TomeError::crawl(repo_url, category, message))
    }
}

/// Read rate-limit headers for observability; never used to throttle.
fn log_rate_limit(response: &reqwest::Response) {
    let remaining = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok());
    let limit = response
        .headers()
        .get("x-ratelimit-limit")
        .and_then(|v| v.to_str().ok());

    if let (Some(remaining), Some(limit)) = (remaining, limit) {
        debug!("Rate limit: {}/{} remaining", remaining, limit);
    }
}

/// Decode a blob from the provider's transfer encoding.
fn decode_blob(content: &str, encoding: &str, path: &str) -> Result<String> {
    match encoding {
        "base64" => {
            let cleaned: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = BASE64.decode(cleaned.as_bytes()).map_err(|e| {
                TomeError::crawl(
                    path,
                    ErrorCategory::ParseError,
                    format!("invalid base64 blob content: {}", e),
                )
            })?;
            String::from_utf8(bytes).map_err(|_| {
                TomeError::crawl(
                    path,
                    ErrorCategory::ParseError,
                    "blob content is not valid UTF-8",
                )
            })
        }
        "utf-8" => Ok(content.to_string()),
        other => Err(TomeError::crawl(
            path,
            ErrorCategory::ParseError,
            format!("unsupported blob encoding '{}'", other),
        )),
    }
}

/// Extract `(owner, repo)` from a repository URL.
fn parse_repo_url(repo_url: &str) -> Result<(String, String)> {
    let parsed = url::Url::parse(repo_url)
        .map_err(|e| TomeError::Config(format!("Invalid repository URL '{}': {}", repo_url, e)))?;

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        [owner, repo, ..] => Ok((
            (*owner).to_string(),
            repo.trim_end_matches(".git").to_string(),
        )),
        _ => Err(TomeError::Config(format!(
            "Repository URL '{}' must include owner and repository name",
            repo_url
        ))),
    }
}

// =============================================================================
// API Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct TreeEntry {
    path: String,
    sha: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BlobResponse {
    content: String,
    encoding: String,
}
