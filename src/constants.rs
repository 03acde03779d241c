//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Repository crawler constants
pub mod crawler {
    /// Maximum file size to download (bytes)
    pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024;

    /// Number of blob downloads issued concurrently per batch
    pub const BLOB_BATCH_SIZE: usize = 10;

    /// Hosting API base URL
    pub const GITHUB_API_BASE: &str = "https://api.github.com";

    /// User-Agent header required by the hosting API
    pub const USER_AGENT: &str = concat!("codetome/", env!("CARGO_PKG_VERSION"));
}

/// Context builder constants
pub mod context {
    /// Approximate characters per token for budget math
    pub const CHARS_PER_TOKEN: f64 = 4.0;

    /// Fraction of the model context window the builder may consume
    pub const CONTEXT_USAGE_RATIO: f64 = 0.70;

    /// Default model context window (tokens)
    pub const DEFAULT_CONTEXT_WINDOW_TOKENS: usize = 128_000;

    /// Per-file line allowance before head/tail truncation kicks in
    pub const MAX_LINES_PER_FILE: usize = 400;

    /// Share of the per-file allowance kept from the head of the file
    pub const TRUNCATION_HEAD_RATIO: f64 = 0.80;
}

/// Pipeline constants
pub mod pipeline {
    /// Minimum number of abstractions requested from the model
    pub const MIN_ABSTRACTIONS: usize = 3;

    /// Default maximum number of abstractions requested from the model
    pub const DEFAULT_MAX_ABSTRACTIONS: usize = 10;

    /// Number of fixed stages reported through the progress channel
    pub const STAGE_COUNT: usize = 6;

    /// Characters of each written chapter carried into the cumulative
    /// digest that later chapters receive for narrative continuity
    pub const CHAPTER_DIGEST_CHARS: usize = 1_500;
}

/// Provider retry constants
pub mod chain {
    /// Default maximum retries per provider call
    pub const DEFAULT_MAX_RETRIES: usize = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;
}

/// Cache constants
pub mod cache {
    /// Default cache directory under the user cache root
    pub const DEFAULT_CACHE_SUBDIR: &str = "codetome";

    /// File extension for persisted cache indices
    pub const INDEX_EXTENSION: &str = "json";
}

/// Cost estimation constants
pub mod cost {
    /// Approximate characters per token (shared with the context builder)
    pub const CHARS_PER_TOKEN: f64 = 4.0;

    /// Prompt scaffolding overhead applied to input token projections
    pub const PROMPT_OVERHEAD: f64 = 1.15;

    /// Relative width of the cost confidence band
    pub const BAND_RATIO: f64 = 0.20;

    /// Fixed output-token projections per analytical phase, calibrated
    /// against observed runs rather than measured at runtime.
    pub mod output_tokens {
        pub const IDENTIFY_ABSTRACTIONS: u64 = 1_200;
        pub const ANALYZE_RELATIONSHIPS: u64 = 900;
        pub const ORDER_CHAPTERS: u64 = 200;
        pub const PER_CHAPTER: u64 = 2_500;
    }

    /// Share of total repository characters that survives signature
    /// extraction for the whole-repository analysis prompt.
    pub const SIGNATURE_RETENTION_RATIO: f64 = 0.35;

    /// Share of total repository characters included in the relationship
    /// analysis context (full mode, restricted to referenced files).
    pub const RELATIONSHIP_CONTEXT_RATIO: f64 = 0.50;

    /// Share of total repository characters included in one chapter's
    /// narrow context.
    pub const CHAPTER_CONTEXT_RATIO: f64 = 0.15;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;
}
