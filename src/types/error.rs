//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//! Provides error classification for retry decisions and crawl failure
//! semantics.
//!
//! ## Error Categories
//!
//! - **RateLimit**: API rate limiting (wait and retry)
//! - **Auth**: Authentication rejected (fail fast)
//! - **NotFound**: Missing/renamed/private repository or resource
//! - **Network**: Connectivity issues (retry with backoff)
//! - **Transient**: Temporary server issues (retry)
//!
//! ## Design Principles
//!
//! - Single unified error type (TomeError) for the entire application
//! - Structured variants with stage/repository context
//! - Category-based routing for retry decisions
//! - No panic/unwrap - all errors are recoverable

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Error categories for retry routing, classified from transport failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited - wait then retry
    RateLimit,
    /// Authentication failed - fail fast, don't retry
    Auth,
    /// Resource does not exist (or is private without a token)
    NotFound,
    /// Network/connectivity issues - retry with backoff
    Network,
    /// Invalid request - don't retry, fix request
    BadRequest,
    /// Parsing a response failed
    ParseError,
    /// Temporary server issues - retry
    Transient,
    /// Unknown error - conservative retry
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Network => write!(f, "NETWORK"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::ParseError => write!(f, "PARSE_ERROR"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Check if this category is retryable against the same endpoint
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Network | Self::Transient)
    }

    /// Get recommended retry delay for this category
    pub fn recommended_delay(&self) -> Duration {
        match self {
            Self::RateLimit => Duration::from_secs(30),
            Self::Network => Duration::from_secs(5),
            Self::Transient => Duration::from_secs(2),
            _ => Duration::from_millis(500),
        }
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// LLM collaborator error with category, context, and retry hints
#[derive(Debug, Clone)]
pub struct LlmError {
    /// Error category for routing decisions
    pub category: ErrorCategory,
    /// Detailed error message
    pub message: String,
    /// Provider that produced the error
    pub provider: Option<String>,
    /// Suggested wait time before retry (if applicable)
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    /// Create a new LLM error
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
            retry_after: None,
        }
    }

    /// Create error with provider context
    pub fn with_provider(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            provider: Some(provider.into()),
            retry_after: None,
        }
    }

    /// Add suggested retry delay
    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    /// Check if error is retryable on the same provider
    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }

    /// Get recommended retry delay
    pub fn recommended_delay(&self) -> Duration {
        self.retry_after
            .unwrap_or_else(|| self.category.recommended_delay())
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Classifies transport failures from HTTP status codes
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an HTTP status into an error category
    pub fn classify_status(status: u16) -> ErrorCategory {
        match status {
            429 => ErrorCategory::RateLimit,
            401 | 403 => ErrorCategory::Auth,
            404 => ErrorCategory::NotFound,
            400 | 422 => ErrorCategory::BadRequest,
            500 | 502 | 503 | 504 => ErrorCategory::Transient,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Classify an HTTP status from an LLM provider into a structured error
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> LlmError {
        let category = Self::classify_status(status);
        let err = LlmError::with_provider(category, message, provider);
        match category {
            ErrorCategory::RateLimit => err.retry_after(Duration::from_secs(30)),
            ErrorCategory::Transient => err.retry_after(Duration::from_secs(5)),
            _ => err,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Structured validation error for LLM output that failed a schema or
/// referential-integrity check. Always fatal to the current stage.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Pipeline stage that rejected the output
    pub stage: String,
    /// Field or component that failed validation
    pub field: Option<String>,
    /// Detailed message
    pub message: String,
    /// Expected value or format
    pub expected: Option<String>,
    /// Actual value received
    pub actual: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.field, &self.expected, &self.actual) {
            (Some(field), Some(expected), Some(actual)) => write!(
                f,
                "{}: invalid '{}': {} (expected {}, got {})",
                self.stage, field, self.message, expected, actual
            ),
            (Some(field), _, _) => {
                write!(f, "{}: invalid '{}': {}", self.stage, field, self.message)
            }
            _ => write!(f, "{}: {}", self.stage, self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    /// Create a new validation error for a stage
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            field: None,
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    /// Add field context
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Add expected/actual values
    pub fn with_comparison(
        mut self,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum TomeError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // -------------------------------------------------------------------------
    // Crawler Errors
    // -------------------------------------------------------------------------
    /// Repository-level crawl failure classified from the hosting API status
    #[error("Crawl failed for {repo}: [{category}] {message}")]
    Crawl {
        repo: String,
        category: ErrorCategory,
        message: String,
    },

    // -------------------------------------------------------------------------
    // LLM Errors
    // -------------------------------------------------------------------------
    /// Structured LLM error with category and retry hints
    #[error("LLM error: {0}")]
    Llm(LlmError),

    // -------------------------------------------------------------------------
    // Pipeline Errors
    // -------------------------------------------------------------------------
    /// Stage-level failure that aborts the whole job
    #[error("Pipeline stage '{stage}' failed: {message}")]
    Stage { stage: String, message: String },

    #[error("{0}")]
    Validation(ValidationError),

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl From<LlmError> for TomeError {
    fn from(err: LlmError) -> Self {
        TomeError::Llm(err)
    }
}

impl From<ValidationError> for TomeError {
    fn from(err: ValidationError) -> Self {
        TomeError::Validation(err)
    }
}

pub type Result<T> = std::result::Result<T, TomeError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl TomeError {
    /// Create a crawl error with repository context
    pub fn crawl(
        repo: impl Into<String>,
        category: ErrorCategory,
        message: impl Into<String>,
    ) -> Self {
        Self::Crawl {
            repo: repo.into(),
            category,
            message: message.into(),
        }
    }

    /// Create a stage error
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create an LLM error with category
    pub fn llm_with_category(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self::Llm(LlmError::new(category, message))
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Llm(e) => e.is_retryable(),
            Self::Crawl { category, .. } => category.is_retryable(),
            Self::Http(_) => true,
            _ => false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::RateLimit.to_string(), "RATE_LIMIT");
        assert_eq!(ErrorCategory::NotFound.to_string(), "NOT_FOUND");
        assert_eq!(ErrorCategory::Auth.to_string(), "AUTH");
    }

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::RateLimit.is_retryable());
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Transient.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::NotFound.is_retryable());
        assert!(!ErrorCategory::BadRequest.is_retryable());
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(ErrorClassifier::classify_status(429), ErrorCategory::RateLimit);
        assert_eq!(ErrorClassifier::classify_status(401), ErrorCategory::Auth);
        assert_eq!(ErrorClassifier::classify_status(403), ErrorCategory::Auth);
        assert_eq!(ErrorClassifier::classify_status(404), ErrorCategory::NotFound);
        assert_eq!(ErrorClassifier::classify_status(503), ErrorCategory::Transient);
        assert_eq!(ErrorClassifier::classify_status(418), ErrorCategory::Unknown);
    }

    #[test]
    fn test_classify_http_status_retry_hint() {
        let err = ErrorClassifier::classify_http_status(429, "Rate limited", "openai");
        assert_eq!(err.category, ErrorCategory::RateLimit);
        assert!(err.is_retryable());
        assert!(err.recommended_delay() >= Duration::from_secs(30));
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::with_provider(ErrorCategory::RateLimit, "Too many requests", "openai");
        assert_eq!(err.to_string(), "[openai:RATE_LIMIT] Too many requests");

        let err_no_provider = LlmError::new(ErrorCategory::Network, "Connection failed");
        assert_eq!(err_no_provider.to_string(), "[NETWORK] Connection failed");
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("order_chapters", "duplicate index")
            .with_field("chapter_order")
            .with_comparison("a permutation of 0..3", "[0, 0, 2]");
        let rendered = err.to_string();
        assert!(rendered.contains("order_chapters"));
        assert!(rendered.contains("chapter_order"));
        assert!(rendered.contains("[0, 0, 2]"));
    }

    #[test]
    fn test_crawl_error_context() {
        let err = TomeError::crawl(
            "https://github.com/acme/widget",
            ErrorCategory::NotFound,
            "repository not found or private",
        );
        let rendered = err.to_string();
        assert!(rendered.contains("acme/widget"));
        assert!(rendered.contains("NOT_FOUND"));
        assert!(!err.is_recoverable());
    }
}
